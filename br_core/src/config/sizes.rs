use snafu::{Location, Snafu};

/// Approximate on-disk megabytes generated per benchmark scale factor unit.
pub const MB_PER_SCALE_FACTOR: u64 = 15;

/// One data-set size to benchmark. Order within a run is significant: every
/// configuration starts from the remote state the previous one left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    scale_factor: u32,
    label: String,
}

impl Configuration {
    pub fn new(scale_factor: u32, label: impl Into<String>) -> Result<Self, SizeLabelError> {
        let label = label.into();
        if scale_factor == 0 {
            return ZeroScaleFactorSnafu { label }.fail();
        }
        Ok(Self {
            scale_factor,
            label,
        })
    }

    /// Builds a configuration from a label such as `3GB`, deriving the scale factor.
    pub fn from_size_label(label: &str) -> Result<Self, SizeLabelError> {
        let label = label.trim();
        let target_mb = parse_size_label_mb(label)?;
        Self::new(scale_factor_for_mb(target_mb), label)
    }

    pub fn scale_factor(&self) -> u32 {
        self.scale_factor
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// The four sizes benchmarked when no list is supplied.
pub fn default_configurations() -> Vec<Configuration> {
    [(68, "1GB"), (205, "3GB"), (341, "5GB"), (614, "9GB")]
        .into_iter()
        .map(|(scale_factor, label)| Configuration {
            scale_factor,
            label: label.to_string(),
        })
        .collect()
}

/// Parses a comma separated list like `1GB,500MB`.
pub fn parse_configurations(list: &str) -> Result<Vec<Configuration>, SizeLabelError> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(Configuration::from_size_label)
        .collect()
}

/// Converts `1GB`, `500MB`, `2048KB` or a bare number of megabytes to megabytes.
pub fn parse_size_label_mb(label: &str) -> Result<u64, SizeLabelError> {
    let normalized = label.trim().to_ascii_uppercase();
    let (number, multiplier) = if let Some(number) = normalized.strip_suffix("GB") {
        (number, 1024.0)
    } else if let Some(number) = normalized.strip_suffix("MB") {
        (number, 1.0)
    } else if let Some(number) = normalized.strip_suffix("KB") {
        (number, 1.0 / 1024.0)
    } else {
        (normalized.as_str(), 1.0)
    };
    let value: f64 = number.trim().parse().map_err(|_| {
        InvalidLabelSnafu {
            label: label.to_string(),
        }
        .build()
    })?;
    if !value.is_finite() || value < 0.0 {
        return InvalidLabelSnafu {
            label: label.to_string(),
        }
        .fail();
    }
    Ok((value * multiplier) as u64)
}

pub fn scale_factor_for_mb(target_mb: u64) -> u32 {
    let factor = (target_mb / MB_PER_SCALE_FACTOR).max(1);
    u32::try_from(factor).unwrap_or(u32::MAX)
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SizeLabelError {
    #[snafu(display("Invalid size label `{label}`, expected e.g. 1GB, 500MB or 2048KB"))]
    InvalidLabel {
        label: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Configuration `{label}` has a zero scale factor"))]
    ZeroScaleFactor {
        label: String,
        #[snafu(implicit)]
        location: Location,
    },
}
