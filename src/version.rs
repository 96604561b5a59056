//! Build stamp of the running binary

use std::fmt;

/// What this binary was built from
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub name: &'static str,
    pub version: &'static str,
    /// Short commit hash, `+dirty` when built from a modified tree
    pub commit: &'static str,
    pub build_date: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            commit: env!("SCIPLAN_COMMIT"),
            build_date: env!("SCIPLAN_BUILD_DATE"),
            target: env!("SCIPLAN_TARGET"),
            profile: env!("SCIPLAN_PROFILE"),
        }
    }

    /// `User-Agent` sent to the gateway and agent services
    pub fn user_agent(&self) -> String {
        format!("{}/{} ({})", self.name, self.version, self.commit)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {} ({})", self.name, self.version, self.commit)?;
        writeln!(f, "  Built:   {} [{}]", self.build_date, self.profile)?;
        writeln!(f, "  Target:  {}", self.target)
    }
}

pub fn print_version() {
    print!("{}", BuildInfo::current());
}
