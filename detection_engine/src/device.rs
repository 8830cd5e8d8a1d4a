use std::{fmt, str::FromStr};

/// Compute device an engine is bound to for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSelector {
    Cpu,
    Cuda(i32),
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Cpu => write!(f, "cpu"),
            DeviceSelector::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}

impl FromStr for DeviceSelector {
    type Err = String;

    /// Accepts `cpu`, a bare device index (`2`) or `cuda:<index>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "cpu" {
            return Ok(Self::Cpu);
        }

        let index = s.strip_prefix("cuda:").unwrap_or(&s);
        match index.parse::<i32>() {
            Ok(id) if id >= 0 => Ok(Self::Cuda(id)),
            _ => Err(format!(
                "{} is not a supported device. Use `cpu`, a device index or `cuda:<index>`.",
                s
            )),
        }
    }
}
