//! Options controlling a suite compile.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ids::BuildVersion;

/// Client features that can be switched off or gated by build version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Usercase,
    CaseSearch,
    InlineSearch,
    SessionEndpoints,
    MultiSelect,
    DataRegistry,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Usercase,
        Feature::CaseSearch,
        Feature::InlineSearch,
        Feature::SessionEndpoints,
        Feature::MultiSelect,
        Feature::DataRegistry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Usercase => "usercase",
            Feature::CaseSearch => "case_search",
            Feature::InlineSearch => "inline_search",
            Feature::SessionEndpoints => "session_endpoints",
            Feature::MultiSelect => "multi_select",
            Feature::DataRegistry => "data_registry",
        }
    }

    /// Oldest client build that understands the feature.
    pub fn min_version(self) -> Option<BuildVersion> {
        match self {
            Feature::Usercase | Feature::CaseSearch => None,
            Feature::SessionEndpoints => Some(BuildVersion::new(2, 51)),
            Feature::MultiSelect | Feature::InlineSearch | Feature::DataRegistry => {
                Some(BuildVersion::new(2, 53))
            }
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Feature::ALL
            .into_iter()
            .find(|feature| feature.as_str() == normalized)
            .ok_or_else(|| format!("unknown feature: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub usercase: bool,
    pub case_search: bool,
    pub inline_search: bool,
    pub session_endpoints: bool,
    pub multi_select: bool,
    pub data_registry: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            usercase: true,
            case_search: true,
            inline_search: true,
            session_endpoints: true,
            multi_select: true,
            data_registry: true,
        }
    }
}

impl FeatureFlags {
    pub fn is_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Usercase => self.usercase,
            Feature::CaseSearch => self.case_search,
            Feature::InlineSearch => self.inline_search,
            Feature::SessionEndpoints => self.session_endpoints,
            Feature::MultiSelect => self.multi_select,
            Feature::DataRegistry => self.data_registry,
        }
    }

    pub fn set(&mut self, feature: Feature, enabled: bool) {
        let flag = match feature {
            Feature::Usercase => &mut self.usercase,
            Feature::CaseSearch => &mut self.case_search,
            Feature::InlineSearch => &mut self.inline_search,
            Feature::SessionEndpoints => &mut self.session_endpoints,
            Feature::MultiSelect => &mut self.multi_select,
            Feature::DataRegistry => &mut self.data_registry,
        };
        *flag = enabled;
    }
}

/// Options threaded through every compile stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Client build to gate features against. Falls back to the app's
    /// own build version.
    pub target_version: Option<BuildVersion>,
    pub features: FeatureFlags,
    pub domain: String,
    pub app_id: String,
    pub base_url: String,
    /// Compile forms on the rayon pool.
    pub parallel: bool,
    /// Memoize session plans by graph fingerprint.
    pub enable_cache: bool,
    /// Treat warning diagnostics as failures.
    pub deny_warnings: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            target_version: None,
            features: FeatureFlags::default(),
            domain: "demo".to_string(),
            app_id: "app".to_string(),
            base_url: "https://www.commcarehq.org".to_string(),
            parallel: true,
            enable_cache: true,
            deny_warnings: false,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that fail on any diagnostic, warnings included.
    pub fn strict() -> Self {
        Self {
            deny_warnings: true,
            ..Self::default()
        }
    }

    pub fn with_target_version(mut self, version: BuildVersion) -> Self {
        self.target_version = Some(version);
        self
    }

    pub fn with_feature(mut self, feature: Feature, enabled: bool) -> Self {
        self.features.set(feature, enabled);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cache(mut self, enable: bool) -> Self {
        self.enable_cache = enable;
        self
    }

    pub fn with_deny_warnings(mut self, deny: bool) -> Self {
        self.deny_warnings = deny;
        self
    }

    /// Whether `feature` is enabled and supported by the target build.
    pub fn feature_available(&self, feature: Feature, app_version: BuildVersion) -> bool {
        let version = self.target_version.unwrap_or(app_version);
        self.features.is_enabled(feature)
            && feature.min_version().is_none_or(|min| version >= min)
    }

    /// `{base_url}/a/{domain}`
    pub fn domain_url(&self) -> String {
        format!("{}/a/{}", self.base_url.trim_end_matches('/'), self.domain)
    }
}
