//! Token 计数
//!
//! 真实的 tokenizer 绑定在具体模型上，由调用方注入；这里只提供 trait、
//! 一个按字符数估算的默认实现和一个对长文本抽样估算的包装器。

/// 文本 → token 数
pub trait TokenCounter {
    fn count_tokens(&self, text: &str) -> usize;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> usize,
{
    fn count_tokens(&self, text: &str) -> usize {
        self(text)
    }
}

/// 按平均每 token 字符数估算
#[derive(Debug, Clone, Copy)]
pub struct HeuristicCounter {
    chars_per_token: f64,
}

impl Default for HeuristicCounter {
    fn default() -> Self {
        Self {
            chars_per_token: 4.0,
        }
    }
}

impl HeuristicCounter {
    pub fn new(chars_per_token: f64) -> Self {
        Self {
            chars_per_token: chars_per_token.max(0.5),
        }
    }
}

impl TokenCounter for HeuristicCounter {
    fn count_tokens(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count() as f64;
        (chars / self.chars_per_token).ceil() as usize
    }
}

/// 长文本抽样估算：取约 100 行样本计数，再按字符长度等比放大
pub struct SampledCounter<C> {
    inner: C,
    threshold: usize,
}

impl<C: TokenCounter> SampledCounter<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            threshold: 200,
        }
    }

    /// 短于 `threshold` 字节的文本直接交给内部计数器
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }
}

impl<C: TokenCounter> TokenCounter for SampledCounter<C> {
    fn count_tokens(&self, text: &str) -> usize {
        if text.len() < self.threshold {
            return self.inner.count_tokens(text);
        }

        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let step = (lines.len() / 100).max(1);
        let sample: String = lines.iter().step_by(step).copied().collect();
        if sample.is_empty() {
            return self.inner.count_tokens(text);
        }

        let sample_tokens = self.inner.count_tokens(&sample) as f64;
        (sample_tokens / sample.len() as f64 * text.len() as f64).round() as usize
    }
}
