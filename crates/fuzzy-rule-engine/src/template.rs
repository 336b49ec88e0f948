//! 消息模板
//!
//! 支持 `{0}`、`{1}` 形式的位置占位符，占位符在构建期解析为片段序列，
//! 渲染时按位置代入规则 `message_args` 对应变量的精确值。

use crate::models::Bindings;
use regex::Regex;
use std::sync::LazyLock;

/// 匹配 {N} 格式的位置占位符
static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\d+)\}").expect("占位符正则表达式无效"));

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Arg(usize),
}

/// 编译后的消息模板
#[derive(Debug, Clone, PartialEq)]
pub struct MessageTemplate {
    source: String,
    args: Vec<String>,
    segments: Vec<Segment>,
}

impl MessageTemplate {
    /// 解析模板并校验占位符与参数数量一致
    pub fn parse(source: &str, args: &[String]) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER_REGEX.captures_iter(source) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let index: usize = caps[1]
                .parse()
                .map_err(|_| format!("占位符 '{}' 的序号无效", whole.as_str()))?;

            if index >= args.len() {
                return Err(format!(
                    "占位符 '{}' 超出参数范围（共 {} 个参数）",
                    whole.as_str(),
                    args.len()
                ));
            }

            if whole.start() > last {
                segments.push(Segment::Literal(source[last..whole.start()].to_string()));
            }
            segments.push(Segment::Arg(index));
            last = whole.end();
        }

        if last < source.len() {
            segments.push(Segment::Literal(source[last..].to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            args: args.to_vec(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// 渲染消息；参数变量缺失时以 `?` 占位
    pub fn render(&self, bindings: &Bindings) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Arg(index) => match bindings.get(&self.args[*index]) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => out.push('?'),
                },
            }
        }
        out
    }
}
