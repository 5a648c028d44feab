//! Kubernetes version parsing and fleet version range.

use semver::Version;

use crate::crd::Machine;
use crate::error::CapuError;

/// Parse a Kubernetes version tolerantly.
///
/// Accepts a leading `v` and a missing patch component (`v1.14` is `1.14.0`).
pub fn parse_version(raw: &str) -> Result<Version, CapuError> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    let normalized = match stripped.split('.').count() {
        1 => format!("{stripped}.0.0"),
        2 => format!("{stripped}.0"),
        _ => stripped.to_string(),
    };

    Version::parse(&normalized).map_err(|_| CapuError::InvalidVersion(raw.to_string()))
}

/// True when `update` moves to a later minor release of the same major version.
pub fn is_minor_version_upgrade(base: &Version, update: &Version) -> bool {
    base.major == update.major && base.minor < update.minor
}

/// Lowest and highest version observed across a fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub min: Version,
    pub max: Version,
}

/// Version range across machines. Machines without a version are ignored;
/// returns `None` if no machine has one.
pub fn version_range(machines: &[Machine]) -> Result<Option<VersionRange>, CapuError> {
    let mut range: Option<VersionRange> = None;

    for machine in machines {
        let Some(raw) = machine.version() else {
            continue;
        };
        let version = parse_version(raw).map_err(|_| {
            CapuError::InvalidVersion(format!(
                "{raw:?} on machine {}/{}",
                machine.namespace(),
                machine.name()
            ))
        })?;

        range = Some(match range {
            None => VersionRange {
                min: version.clone(),
                max: version,
            },
            Some(r) => VersionRange {
                min: r.min.min(version.clone()),
                max: r.max.max(version),
            },
        });
    }

    Ok(range)
}
