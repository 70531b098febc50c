use anyhow::anyhow;
use gallery_core::MAX_ROLE_NAME_CHARS;

pub const DEFAULT_MIN_OWNER_TITLE_CHARS: usize = 10;
pub const DEFAULT_OWNER_ROLE_PREFIX: &str = "_Album Owner";
pub const DEFAULT_TEMPLATE_ROLE_PREFIX: &str = "_Album Owner Template";

#[derive(Clone, Debug)]
pub struct SecurityConfig {
    pub max_role_name_chars: usize,
    pub min_owner_title_chars: usize,
    pub owner_role_prefix: String,
    pub template_role_prefix: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_role_name_chars: MAX_ROLE_NAME_CHARS,
            min_owner_title_chars: DEFAULT_MIN_OWNER_TITLE_CHARS,
            owner_role_prefix: String::from(DEFAULT_OWNER_ROLE_PREFIX),
            template_role_prefix: String::from(DEFAULT_TEMPLATE_ROLE_PREFIX),
        }
    }
}

impl SecurityConfig {
    /// Reads overrides from `GALLERY_*` environment variables.
    ///
    /// # Errors
    /// Returns an error when a numeric override does not parse or falls
    /// outside the range role names allow.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let max_role_name_chars = parse_usize(
            &lookup,
            "GALLERY_MAX_ROLE_NAME_CHARS",
            defaults.max_role_name_chars,
        )?;
        let min_owner_title_chars = parse_usize(
            &lookup,
            "GALLERY_MIN_OWNER_TITLE_CHARS",
            defaults.min_owner_title_chars,
        )?;
        if max_role_name_chars == 0 || max_role_name_chars > MAX_ROLE_NAME_CHARS {
            return Err(anyhow!(
                "GALLERY_MAX_ROLE_NAME_CHARS must be within 1..={MAX_ROLE_NAME_CHARS}, got {max_role_name_chars}"
            ));
        }
        if min_owner_title_chars >= max_role_name_chars {
            return Err(anyhow!(
                "GALLERY_MIN_OWNER_TITLE_CHARS must be below GALLERY_MAX_ROLE_NAME_CHARS"
            ));
        }
        Ok(Self {
            max_role_name_chars,
            min_owner_title_chars,
            ..defaults
        })
    }
}

fn parse_usize(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: usize,
) -> anyhow::Result<usize> {
    lookup(key).map_or(Ok(default), |value| {
        value
            .parse::<usize>()
            .map_err(|e| anyhow!("invalid {key} value {value:?}: {e}"))
    })
}
