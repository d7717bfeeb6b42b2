//! Culture of the user behind the current request

use crate::contract::{CurrentUser, RequestContext};
use std::sync::Arc;

/// Maps a user to a culture name
pub trait UserCultureResolver: Send + Sync {
    /// Culture name for `user` (e.g. "en-GB")
    fn culture(&self, user: Option<&CurrentUser>) -> String;

    /// Display form of the culture used in UI headers
    fn info_string(&self, user: Option<&CurrentUser>) -> String;
}

/// Uses the user's preferred UI culture, falling back to a site default
pub struct DefaultUserCultureResolver {
    default_culture: String,
}

impl DefaultUserCultureResolver {
    pub fn new(default_culture: impl Into<String>) -> Self {
        Self {
            default_culture: default_culture.into(),
        }
    }
}

impl UserCultureResolver for DefaultUserCultureResolver {
    fn culture(&self, user: Option<&CurrentUser>) -> String {
        user.and_then(|u| u.ui_culture.as_deref())
            .map(str::trim)
            .filter(|culture| !culture.is_empty())
            .unwrap_or(&self.default_culture)
            .to_string()
    }

    fn info_string(&self, user: Option<&CurrentUser>) -> String {
        let culture = self.culture(user);
        match user {
            Some(u) => format!("{} ({})", culture, u.email),
            None => culture,
        }
    }
}

/// Culture lookups for the user of an explicit request context
#[derive(Clone)]
pub struct CurrentUserCulture {
    resolver: Arc<dyn UserCultureResolver>,
}

impl CurrentUserCulture {
    pub fn new(resolver: Arc<dyn UserCultureResolver>) -> Self {
        Self { resolver }
    }

    pub fn get(&self, ctx: &RequestContext) -> String {
        self.resolver.culture(ctx.current_user.as_ref())
    }

    pub fn info_string(&self, ctx: &RequestContext) -> String {
        self.resolver.info_string(ctx.current_user.as_ref())
    }
}
