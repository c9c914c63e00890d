use std::fs;

fn main() {
    // 读取 VERSION 文件，缺失时回退到 Cargo 包版本
    let version = fs::read_to_string("VERSION")
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|_| std::env::var("CARGO_PKG_VERSION").unwrap_or_default());

    // 设置环境变量，供 CLI --version 使用
    println!("cargo:rustc-env=APP_VERSION={}", version);

    // 当 VERSION 文件变更时重新运行 build.rs
    println!("cargo:rerun-if-changed=VERSION");
}
