//! Request context passed explicitly to operations that need it

use uuid::Uuid;

/// Authenticated user of the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    /// Preferred UI culture (e.g. "fr-FR")
    pub ui_culture: Option<String>,
}

/// One logical request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    /// Site the request is served for, if any
    pub site_id: Option<Uuid>,
    pub current_user: Option<CurrentUser>,
}

impl RequestContext {
    /// Anonymous request without a site
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            site_id: None,
            current_user: None,
        }
    }

    pub fn for_site(site_id: Uuid) -> Self {
        Self {
            site_id: Some(site_id),
            ..Self::new()
        }
    }

    pub fn with_user(mut self, user: CurrentUser) -> Self {
        self.current_user = Some(user);
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
