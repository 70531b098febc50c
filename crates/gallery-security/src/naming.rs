use anyhow::Context as _;
use gallery_core::{Album, GalleryId};
use regex::Regex;

use crate::config::SecurityConfig;

const ELLIPSIS: &str = "...";

/// Naming conventions for album-owner roles and their per-gallery templates.
#[derive(Debug, Clone)]
pub struct RoleNaming {
    config: SecurityConfig,
    template_pattern: Regex,
}

impl RoleNaming {
    /// # Errors
    /// Returns an error when the configured template prefix cannot be
    /// compiled into the recognition pattern.
    pub fn new(config: &SecurityConfig) -> anyhow::Result<Self> {
        let pattern = format!(
            r"^{} \(Gallery ID (-?\d+): '(.*)'\)$",
            regex::escape(&config.template_role_prefix)
        );
        let template_pattern =
            Regex::new(&pattern).context("template role pattern should compile")?;
        Ok(Self {
            config: config.clone(),
            template_pattern,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    /// Gallery encoded in a template role name, if `name` is one.
    #[must_use]
    pub fn template_gallery(&self, name: &str) -> Option<GalleryId> {
        let captures = self.template_pattern.captures(name)?;
        captures.get(1)?.as_str().parse::<i64>().ok().map(GalleryId::new)
    }

    #[must_use]
    pub fn is_template_role(&self, name: &str) -> bool {
        self.template_gallery(name).is_some()
    }

    #[must_use]
    pub fn is_owner_role(&self, name: &str) -> bool {
        name.starts_with(&self.config.owner_role_prefix) && !self.is_template_role(name)
    }

    #[must_use]
    pub fn template_role_name(&self, gallery_id: GalleryId, description: &str) -> String {
        let head = format!("{} (Gallery ID {gallery_id}: '", self.config.template_role_prefix);
        let tail = "')";
        let available = self
            .config
            .max_role_name_chars
            .saturating_sub(char_len(&head) + char_len(tail));
        let description = shorten(&sanitize(description), available);
        fit(
            format!("{head}{description}{tail}"),
            self.config.max_role_name_chars,
        )
    }

    /// Deterministic owner role name for `album` and `user_name`.
    ///
    /// When the name would be too long the title is shortened first, but not
    /// below the configured minimum, then the user name.
    #[must_use]
    pub fn owner_role_name(&self, album: &Album, user_name: &str) -> String {
        let prefix = &self.config.owner_role_prefix;
        let suffix = format!(" (album {})", album.id);
        let fixed = char_len(prefix) + char_len(" ") + char_len(" - ") + char_len(&suffix);
        let available = self.config.max_role_name_chars.saturating_sub(fixed);

        let mut user = sanitize(user_name);
        let mut title = sanitize(&album.title);
        if char_len(&user) + char_len(&title) > available {
            let min_title = self.config.min_owner_title_chars;
            if char_len(&title) > min_title {
                let target = available.saturating_sub(char_len(&user)).max(min_title);
                title = shorten(&title, target);
            }
            let title_len = char_len(&title);
            if char_len(&user) + title_len > available {
                user = shorten(&user, available.saturating_sub(title_len));
            }
        }

        fit(
            format!("{prefix} {user} - {title}{suffix}"),
            self.config.max_role_name_chars,
        )
    }
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != ',' && !c.is_control())
        .collect::<String>()
        .trim()
        .to_owned()
}

fn shorten(value: &str, max_chars: usize) -> String {
    if char_len(value) <= max_chars {
        return value.to_owned();
    }
    let ellipsis = char_len(ELLIPSIS);
    if max_chars <= ellipsis {
        return value.chars().take(max_chars).collect();
    }
    let kept: String = value.chars().take(max_chars - ellipsis).collect();
    format!("{}{ELLIPSIS}", kept.trim_end())
}

fn fit(value: String, max_chars: usize) -> String {
    if char_len(&value) <= max_chars {
        return value;
    }
    value.chars().take(max_chars).collect::<String>().trim_end().to_owned()
}

#[cfg(test)]
mod tests {
    use super::RoleNaming;
    use crate::config::SecurityConfig;
    use gallery_core::{Album, AlbumId, GalleryId, RoleName};

    fn naming() -> RoleNaming {
        RoleNaming::new(&SecurityConfig::default()).expect("default naming compiles")
    }

    fn album(id: i64, title: &str) -> Album {
        let mut album = Album::new(AlbumId::new(id), GalleryId::new(1), Some(AlbumId::new(1)));
        album.title = title.to_owned();
        album
    }

    #[test]
    fn owner_role_name_embeds_user_title_and_album() {
        let name = naming().owner_role_name(&album(42, "Summer, 2024"), "bob");
        assert_eq!(name, "_Album Owner bob - Summer 2024 (album 42)");
        assert!(naming().is_owner_role(&name));
        assert!(!naming().is_template_role(&name));
        assert!(RoleName::try_from(name).is_ok());
    }

    #[test]
    fn owner_role_name_shortens_title_before_user() {
        let naming = naming();
        let title = "t".repeat(400);
        let name = naming.owner_role_name(&album(7, &title), "carol");
        assert_eq!(name.chars().count(), 256);
        assert!(name.contains("carol - "));
        assert!(name.ends_with("t... (album 7)"));
    }

    #[test]
    fn owner_role_name_keeps_minimum_title_fragment() {
        let naming = naming();
        let user = "u".repeat(300);
        let name = naming.owner_role_name(&album(7, "A fairly long album title"), &user);
        assert!(name.chars().count() <= 256);
        assert!(name.contains(" - A fairl... (album 7)"));
        assert!(name.contains("u..."));
    }

    #[test]
    fn owner_role_name_is_bounded_for_pathological_inputs() {
        let naming = naming();
        let cases = [
            (String::new(), "u".repeat(300)),
            ("t".repeat(1_000), String::new()),
            ("é".repeat(500), "ü".repeat(500)),
            (String::from(",,,"), String::from("\u{0}\u{1}")),
            (String::new(), String::new()),
        ];
        for (title, user) in cases {
            let name = naming.owner_role_name(&album(i64::MAX, &title), &user);
            assert!(name.chars().count() <= 256, "{name}");
            assert!(RoleName::try_from(name).is_ok());
        }
    }

    #[test]
    fn template_names_round_trip_their_gallery_id() {
        let naming = naming();
        let name = naming.template_role_name(GalleryId::new(3), "Family photos");
        assert_eq!(
            name,
            "_Album Owner Template (Gallery ID 3: 'Family photos')"
        );
        assert_eq!(naming.template_gallery(&name), Some(GalleryId::new(3)));
        assert!(!naming.is_owner_role(&name));
        assert_eq!(naming.template_gallery("Editors"), None);
        assert_eq!(
            naming.template_gallery("_Album Owner Template (Gallery ID x: 'y')"),
            None
        );
    }

    #[test]
    fn long_template_descriptions_are_truncated() {
        let naming = naming();
        let name = naming.template_role_name(GalleryId::new(12), &"d".repeat(600));
        assert!(name.chars().count() <= 256);
        assert_eq!(naming.template_gallery(&name), Some(GalleryId::new(12)));
    }

    #[test]
    fn custom_prefixes_are_matched_literally() {
        let config = SecurityConfig {
            template_role_prefix: String::from("[tpl] (x)"),
            ..SecurityConfig::default()
        };
        let naming = RoleNaming::new(&config).expect("escaped prefix compiles");
        let name = naming.template_role_name(GalleryId::new(5), "Main");
        assert_eq!(naming.template_gallery(&name), Some(GalleryId::new(5)));
        assert_eq!(
            naming.template_gallery("[tpl] x (Gallery ID 5: 'Main')"),
            None
        );
    }
}
