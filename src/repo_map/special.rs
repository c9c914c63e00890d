//! 重要文件识别
//!
//! 构建清单、说明文档、CI 配置等文件通常没有可排序的符号，但对理解项目至关
//! 重要，地图中把它们放在最前面。

use std::collections::HashSet;
use std::path::Path;

use lazy_static::lazy_static;

const IMPORTANT_FILES: &[&str] = &[
    // 说明文档
    "README", "README.md", "README.rst", "README.txt", "CONTRIBUTING.md", "CHANGELOG.md",
    "LICENSE", "LICENSE.md", "LICENSE.txt", "SECURITY.md",
    // Rust
    "Cargo.toml", "rust-toolchain.toml", "rustfmt.toml", "clippy.toml",
    // Python
    "pyproject.toml", "setup.py", "setup.cfg", "requirements.txt", "Pipfile", "tox.ini",
    "poetry.lock",
    // JavaScript / TypeScript
    "package.json", "tsconfig.json", ".eslintrc.json", ".prettierrc", "webpack.config.js",
    "vite.config.ts", "babel.config.js",
    // Go / JVM / 其它
    "go.mod", "go.work", "pom.xml", "build.gradle", "build.gradle.kts", "settings.gradle",
    "Gemfile", "composer.json", "mix.exs", "CMakeLists.txt", "meson.build",
    // 构建与部署
    "Makefile", "Justfile", "Dockerfile", "docker-compose.yml", "docker-compose.yaml",
    "Procfile", "Vagrantfile", ".gitlab-ci.yml", ".travis.yml", "Jenkinsfile",
    ".editorconfig", ".gitignore", ".env.example",
];

lazy_static! {
    static ref IMPORTANT_SET: HashSet<&'static str> = IMPORTANT_FILES.iter().copied().collect();
}

/// 相对路径是否指向重要文件
pub fn is_important(relative_path: &str) -> bool {
    let normalized = relative_path.replace('\\', "/");
    let path = Path::new(&normalized);

    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    // GitHub Actions 工作流
    if let Some(parent) = path.parent() {
        if parent == Path::new(".github/workflows")
            && (file_name.ends_with(".yml") || file_name.ends_with(".yaml"))
        {
            return true;
        }
    }

    IMPORTANT_SET.contains(file_name)
}

/// 过滤出重要文件，保持输入顺序
pub fn filter_important_files<'a, I>(relative_paths: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    relative_paths
        .into_iter()
        .filter(|path| is_important(path))
        .collect()
}
