//! 模糊逻辑操作符
//!
//! 采用 Zadeh 标准算子：AND 取最小值，OR 取最大值，NOT 取补。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 模糊 AND（最小值 T-范数）
pub fn and(a: f64, b: f64) -> f64 {
    a.min(b)
}

/// 模糊 OR（最大值 S-范数）
pub fn or(a: f64, b: f64) -> f64 {
    a.max(b)
}

/// 模糊 NOT（标准补）
pub fn not(a: f64) -> f64 {
    1.0 - a
}

/// 是否为合法隶属度
pub fn is_valid_degree(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

/// 将数值截断到 [0, 1]
pub fn clamp_degree(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// 语言修饰词
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hedge {
    /// 集中化 μ²
    Very,
    /// 扩张化 √μ
    Somewhat,
    /// 强集中化 μ³
    Extremely,
}

impl Hedge {
    pub fn apply(self, degree: f64) -> f64 {
        match self {
            Self::Very => degree * degree,
            Self::Somewhat => degree.sqrt(),
            Self::Extremely => degree * degree * degree,
        }
    }
}

impl fmt::Display for Hedge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Very => "very",
            Self::Somewhat => "somewhat",
            Self::Extremely => "extremely",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn degrees() -> Vec<f64> {
        (0..=20).map(|i| i as f64 / 20.0).collect()
    }

    #[test]
    fn test_idempotence_and_involution() {
        for x in degrees() {
            assert_eq!(and(x, x), x);
            assert_eq!(or(x, x), x);
            assert!((not(not(x)) - x).abs() < 1e-12);
        }
    }

    #[test]
    fn test_and_or_bounds() {
        for x in degrees() {
            for y in degrees() {
                assert!(and(x, y) <= x && and(x, y) <= y);
                assert!(or(x, y) >= x && or(x, y) >= y);
                assert!(is_valid_degree(and(x, y)));
                assert!(is_valid_degree(or(x, y)));
                assert!(is_valid_degree(not(x)));
            }
        }
    }

    #[test]
    fn test_hedges_stay_in_range() {
        for x in degrees() {
            for hedge in [Hedge::Very, Hedge::Somewhat, Hedge::Extremely] {
                assert!(is_valid_degree(hedge.apply(x)), "{} {}", hedge, x);
            }
        }
        assert_eq!(Hedge::Very.apply(0.5), 0.25);
        assert_eq!(Hedge::Somewhat.apply(0.25), 0.5);
        assert_eq!(Hedge::Extremely.apply(0.5), 0.125);
    }

    #[test]
    fn test_clamp_degree() {
        assert_eq!(clamp_degree(-0.2), 0.0);
        assert_eq!(clamp_degree(1.7), 1.0);
        assert_eq!(clamp_degree(0.3), 0.3);
    }

    #[test]
    fn test_hedge_serde_names() {
        assert_eq!(serde_json::to_string(&Hedge::Somewhat).unwrap(), "\"somewhat\"");
        let hedge: Hedge = serde_json::from_str("\"extremely\"").unwrap();
        assert_eq!(hedge, Hedge::Extremely);
    }
}
