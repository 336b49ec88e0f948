//! 隶属函数
//!
//! 将精确值映射为 [0, 1] 区间的隶属度。以梯形为标准形状，
//! 三角形是 `b == c` 的退化梯形；另外支持高斯形状。

use crate::error::{Result, RuleError};
use crate::models::ShapeDef;
use crate::operators;

/// 隶属函数形状
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// 梯形 `a < b <= c < d`
    Trapezoid { a: f64, b: f64, c: f64, d: f64 },
    /// 高斯 `exp(-(x - mean)² / (2σ²))`
    Gaussian { mean: f64, sigma: f64 },
}

/// 语言项的隶属函数，构建后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct MembershipFunction {
    name: String,
    shape: Shape,
}

impl MembershipFunction {
    /// 创建梯形隶属函数
    ///
    /// 要求 `a < b <= c < d`，`b == c` 即三角形。
    pub fn trapezoid(name: impl Into<String>, a: f64, b: f64, c: f64, d: f64) -> Result<Self> {
        let name = name.into();

        if ![a, b, c, d].iter().all(|v| v.is_finite()) {
            return Err(invalid_shape(&name, "断点必须是有限数值"));
        }

        if !(a < b && b <= c && c < d) {
            return Err(invalid_shape(
                &name,
                &format!("断点必须满足 a < b <= c < d，实际为 ({}, {}, {}, {})", a, b, c, d),
            ));
        }

        // 跨度溢出时斜坡计算会得到 inf/inf
        if !(d - a).is_finite() {
            return Err(invalid_shape(
                &name,
                &format!("支撑集跨度 d - a 超出浮点范围 ({}, {})", a, d),
            ));
        }

        Ok(Self {
            name,
            shape: Shape::Trapezoid { a, b, c, d },
        })
    }

    /// 创建三角形隶属函数，等价于 `trapezoid(a, peak, peak, c)`
    pub fn triangle(name: impl Into<String>, a: f64, peak: f64, c: f64) -> Result<Self> {
        Self::trapezoid(name, a, peak, peak, c)
    }

    /// 创建高斯隶属函数
    pub fn gaussian(name: impl Into<String>, mean: f64, sigma: f64) -> Result<Self> {
        let name = name.into();

        if !mean.is_finite() || !sigma.is_finite() {
            return Err(invalid_shape(&name, "mean 和 sigma 必须是有限数值"));
        }

        if sigma <= 0.0 {
            return Err(invalid_shape(&name, &format!("sigma 必须为正数，实际为 {}", sigma)));
        }

        Ok(Self {
            name,
            shape: Shape::Gaussian { mean, sigma },
        })
    }

    /// 从文档中的形状定义创建
    pub fn from_def(name: impl Into<String>, def: &ShapeDef) -> Result<Self> {
        match *def {
            ShapeDef::Trapezoid { points: [a, b, c, d] } => Self::trapezoid(name, a, b, c, d),
            ShapeDef::Triangle { points: [a, b, c] } => Self::triangle(name, a, b, c),
            ShapeDef::Gaussian { mean, sigma } => Self::gaussian(name, mean, sigma),
        }
    }

    /// 转回文档中的形状定义
    pub fn to_def(&self) -> ShapeDef {
        match self.shape {
            Shape::Trapezoid { a, b, c, d } if b == c => ShapeDef::Triangle { points: [a, b, d] },
            Shape::Trapezoid { a, b, c, d } => ShapeDef::Trapezoid {
                points: [a, b, c, d],
            },
            Shape::Gaussian { mean, sigma } => ShapeDef::Gaussian { mean, sigma },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// 计算隶属度，对任意输入都有定义，NaN 的隶属度为 0
    pub fn evaluate(&self, x: f64) -> f64 {
        let degree = match self.shape {
            Shape::Trapezoid { a, b, c, d } => {
                // 取反写法同时把 NaN 归入支撑集之外
                if !(x > a && x < d) {
                    0.0
                } else if x >= b && x <= c {
                    1.0
                } else if x < b {
                    (x - a) / (b - a)
                } else {
                    (d - x) / (d - c)
                }
            }
            Shape::Gaussian { mean, sigma } => {
                // 先除以 sigma 再平方，极小的 sigma 不会让分母下溢为 0
                let z = (x - mean) / sigma;
                (-0.5 * z * z).exp()
            }
        };

        if degree.is_nan() {
            0.0
        } else {
            operators::clamp_degree(degree)
        }
    }

    /// 支撑集，高斯形状取 3σ 范围
    pub fn support(&self) -> (f64, f64) {
        match self.shape {
            Shape::Trapezoid { a, d, .. } => (a, d),
            Shape::Gaussian { mean, sigma } => (mean - 3.0 * sigma, mean + 3.0 * sigma),
        }
    }

    /// 核（隶属度为 1 的区间）
    pub fn core(&self) -> Option<(f64, f64)> {
        match self.shape {
            Shape::Trapezoid { b, c, .. } => Some((b, c)),
            Shape::Gaussian { mean, .. } => Some((mean, mean)),
        }
    }
}

fn invalid_shape(term: &str, reason: &str) -> RuleError {
    RuleError::InvalidShape {
        term: term.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_trapezoid() -> MembershipFunction {
        MembershipFunction::trapezoid("medium", 0.0, 20.0, 80.0, 100.0).unwrap()
    }

    #[test]
    fn test_trapezoid_reference_points() {
        let mf = sample_trapezoid();
        assert_eq!(mf.evaluate(50.0), 1.0);
        assert_eq!(mf.evaluate(10.0), 0.5);
        assert_eq!(mf.evaluate(0.0), 0.0);
        assert_eq!(mf.evaluate(100.0), 0.0);
        assert_eq!(mf.evaluate(90.0), 0.5);
    }

    #[test]
    fn test_trapezoid_bounds_over_grid() {
        let mf = sample_trapezoid();
        let mut x = -50.0;
        while x <= 150.0 {
            let degree = mf.evaluate(x);
            assert!((0.0..=1.0).contains(&degree), "x={} degree={}", x, degree);
            if (20.0..=80.0).contains(&x) {
                assert_eq!(degree, 1.0, "plateau at x={}", x);
            }
            x += 0.25;
        }
    }

    #[test]
    fn test_ramps_are_monotonic() {
        let mf = sample_trapezoid();

        let rising: Vec<f64> = (1..20).map(|i| mf.evaluate(i as f64)).collect();
        assert!(rising.windows(2).all(|w| w[0] <= w[1]));

        let falling: Vec<f64> = (81..100).map(|i| mf.evaluate(i as f64)).collect();
        assert!(falling.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_triangle_is_degenerate_trapezoid() {
        let mf = MembershipFunction::triangle("peak", 0.0, 5.0, 10.0).unwrap();
        assert_eq!(mf.evaluate(5.0), 1.0);
        assert_eq!(mf.evaluate(2.5), 0.5);
        assert_eq!(mf.evaluate(7.5), 0.5);
        assert_eq!(mf.core(), Some((5.0, 5.0)));
        assert_eq!(mf.support(), (0.0, 10.0));
    }

    #[test]
    fn test_invalid_trapezoid_shapes() {
        assert!(MembershipFunction::trapezoid("t", 0.0, 0.0, 5.0, 10.0).is_err());
        assert!(MembershipFunction::trapezoid("t", 0.0, 6.0, 5.0, 10.0).is_err());
        assert!(MembershipFunction::trapezoid("t", 0.0, 5.0, 10.0, 10.0).is_err());
        assert!(MembershipFunction::trapezoid("t", f64::NAN, 1.0, 2.0, 3.0).is_err());
        assert!(MembershipFunction::triangle("t", 0.0, 0.0, 10.0).is_err());

        let err = MembershipFunction::trapezoid("hot", 3.0, 2.0, 1.0, 0.0).unwrap_err();
        assert!(matches!(err, RuleError::InvalidShape { ref term, .. } if term == "hot"));
    }

    #[test]
    fn test_non_finite_inputs() {
        let mf = sample_trapezoid();
        assert_eq!(mf.evaluate(f64::NAN), 0.0);
        assert_eq!(mf.evaluate(f64::INFINITY), 0.0);
        assert_eq!(mf.evaluate(f64::NEG_INFINITY), 0.0);

        let g = MembershipFunction::gaussian("g", 0.0, 1.0).unwrap();
        assert_eq!(g.evaluate(f64::NAN), 0.0);
        assert_eq!(g.evaluate(f64::INFINITY), 0.0);
    }

    #[test]
    fn test_gaussian() {
        let g = MembershipFunction::gaussian("around_zero", 0.0, 2.0).unwrap();
        assert_eq!(g.evaluate(0.0), 1.0);
        assert!((g.evaluate(2.0) - (-0.5f64).exp()).abs() < 1e-12);
        assert_eq!(g.evaluate(3.0), g.evaluate(-3.0));
        assert_eq!(g.support(), (-6.0, 6.0));
        assert_eq!(g.core(), Some((0.0, 0.0)));

        assert!(MembershipFunction::gaussian("bad", 0.0, 0.0).is_err());
        assert!(MembershipFunction::gaussian("bad", 0.0, -1.0).is_err());
    }

    #[test]
    fn test_tiny_sigma_stays_in_range() {
        let g = MembershipFunction::gaussian("spike", 0.0, 1e-200).unwrap();
        assert_eq!(g.evaluate(0.0), 1.0);
        assert_eq!(g.evaluate(1e-150), 0.0);
        assert_eq!(g.evaluate(-1.0), 0.0);

        let g = MembershipFunction::gaussian("spike", 0.0, f64::MIN_POSITIVE).unwrap();
        assert_eq!(g.evaluate(0.0), 1.0);
        assert_eq!(g.evaluate(1.0), 0.0);
    }

    #[test]
    fn test_extreme_gaussian_inputs() {
        let g = MembershipFunction::gaussian("wide", -1e308, 1e308).unwrap();
        for x in [-1e308, 0.0, 1e308, f64::MAX, f64::NEG_INFINITY] {
            let degree = g.evaluate(x);
            assert!(operators::is_valid_degree(degree), "x={} degree={}", x, degree);
        }
    }

    #[test]
    fn test_overflowing_trapezoid_span_rejected() {
        let err = MembershipFunction::trapezoid("huge", -1e308, 1e308, 1.5e308, 1.7e308).unwrap_err();
        assert!(matches!(err, RuleError::InvalidShape { ref term, .. } if term == "huge"));

        // 跨度在范围内的大数值仍然可用
        let mf = MembershipFunction::trapezoid("big", 0.0, 1e307, 2e307, 4e307).unwrap();
        assert!((mf.evaluate(5e306) - 0.5).abs() < 1e-12);
        assert_eq!(mf.evaluate(1.5e307), 1.0);
    }

    #[test]
    fn test_shape_def_round_trip() {
        let defs = [
            ShapeDef::Trapezoid {
                points: [0.0, 1.0, 2.0, 3.0],
            },
            ShapeDef::Triangle {
                points: [0.0, 1.0, 2.0],
            },
            ShapeDef::Gaussian {
                mean: 5.0,
                sigma: 0.5,
            },
        ];

        for def in defs {
            let mf = MembershipFunction::from_def("term", &def).unwrap();
            assert_eq!(mf.to_def(), def);
        }
    }
}
