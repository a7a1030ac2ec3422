use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Length,
    Palindrome,
    Series,
    Uniform,
}

impl RuleKind {
    pub const ALL: [RuleKind; 4] = [Self::Length, Self::Palindrome, Self::Series, Self::Uniform];
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Length => "length",
            Self::Palindrome => "palindrome",
            Self::Series => "series",
            Self::Uniform => "uniform",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasscodeRule {
    Length { min: usize, max: usize },
    Palindrome,
    Series,
    Uniform,
}

impl PasscodeRule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Length { .. } => RuleKind::Length,
            Self::Palindrome => RuleKind::Palindrome,
            Self::Series => RuleKind::Series,
            Self::Uniform => RuleKind::Uniform,
        }
    }

    /// `Err(reason)` when `candidate` violates the rule.
    pub fn evaluate(&self, candidate: &str) -> Result<(), String> {
        let chars: Vec<char> = candidate.chars().collect();
        match *self {
            Self::Length { min, max } => {
                if chars.len() < min {
                    Err(format!("must be at least {min} digits"))
                } else if chars.len() > max {
                    Err(format!("must be at most {max} digits"))
                } else {
                    Ok(())
                }
            }
            Self::Palindrome => {
                if chars.len() >= 2 && chars.iter().eq(chars.iter().rev()) {
                    Err("must not read the same backwards".into())
                } else {
                    Ok(())
                }
            }
            Self::Series => {
                if is_unit_series(&chars) {
                    Err("must not be an ascending or descending series".into())
                } else {
                    Ok(())
                }
            }
            Self::Uniform => {
                if chars.len() >= 2 && chars.iter().all(|c| *c == chars[0]) {
                    Err("must not repeat a single digit".into())
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Every consecutive pair of digits differs by exactly +1, or every pair by
/// exactly -1. Non-unit steps such as `1357` are not a series.
fn is_unit_series(chars: &[char]) -> bool {
    if chars.len() < 2 {
        return false;
    }
    let Some(digits) = chars
        .iter()
        .map(|c| c.to_digit(10).map(|d| d as i32))
        .collect::<Option<Vec<i32>>>()
    else {
        return false;
    };
    let step = digits[1] - digits[0];
    (step == 1 || step == -1) && digits.windows(2).all(|w| w[1] - w[0] == step)
}
