//! Role-based capability checks.

use crate::error::AccessError;
use crate::types::{AttemptQuery, ExistingRecord, RegistrationDetail, RegistrationQuery, Role, UserProfile};
use serde::Serialize;

/// The authenticated user a request is made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub user_id: String,
    pub full_name: String,
    pub role: Role,
    pub neighborhood_id: Option<String>,
}

/// What a caller may learn about the record that blocked their admission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disclosure {
    pub neighborhood: Option<String>,
    pub name: Option<String>,
}

impl From<&UserProfile> for Caller {
    fn from(profile: &UserProfile) -> Self {
        Self {
            user_id: profile.id.clone(),
            full_name: profile.full_name.clone(),
            role: profile.role,
            neighborhood_id: profile.neighborhood_id.clone(),
        }
    }
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }

    pub fn require_admin(&self) -> Result<(), AccessError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AccessError::Forbidden("administrator role required".into()))
        }
    }

    fn own_neighborhood(&self) -> Result<&str, AccessError> {
        self.neighborhood_id
            .as_deref()
            .ok_or_else(|| AccessError::Forbidden("no neighborhood assigned".into()))
    }

    pub fn can_view_neighborhood(&self, neighborhood_id: &str) -> bool {
        self.is_admin() || self.neighborhood_id.as_deref() == Some(neighborhood_id)
    }

    /// Resolve the neighborhood a new registration is filed under.
    ///
    /// Administrators must name one; everyone else always uses their own.
    pub fn admission_neighborhood(&self, requested: Option<&str>) -> Result<String, AccessError> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());
        match self.role {
            Role::Administrator => requested.map(str::to_string).ok_or_else(|| {
                AccessError::Forbidden("administrators must specify a neighborhood".into())
            }),
            Role::NeighborhoodRepresentative | Role::RegisteredUser => {
                let own = self.own_neighborhood()?;
                match requested {
                    Some(other) if other != own => Err(AccessError::Forbidden(
                        "cannot register into another neighborhood".into(),
                    )),
                    _ => Ok(own.to_string()),
                }
            }
        }
    }

    /// Scope a registration listing to what the caller may see.
    pub fn registration_query(
        &self,
        requested_neighborhood: Option<&str>,
        limit: Option<usize>,
    ) -> Result<RegistrationQuery, AccessError> {
        let neighborhood_id = self.scoped_neighborhood(requested_neighborhood)?;
        let registered_by = match self.role {
            Role::RegisteredUser => Some(self.user_id.clone()),
            _ => None,
        };
        Ok(RegistrationQuery {
            neighborhood_id,
            registered_by,
            limit,
        })
    }

    /// Scope a duplicate-attempt listing. Ordinary users have no access.
    pub fn attempt_query(
        &self,
        requested_neighborhood: Option<&str>,
        limit: Option<usize>,
    ) -> Result<AttemptQuery, AccessError> {
        if self.role == Role::RegisteredUser {
            return Err(AccessError::Forbidden(
                "duplicate attempts are not visible to this role".into(),
            ));
        }
        Ok(AttemptQuery {
            neighborhood_id: self.scoped_neighborhood(requested_neighborhood)?,
            limit,
        })
    }

    /// Neighborhood filter: administrators choose freely, others are pinned to their own.
    pub fn scoped_neighborhood(&self, requested: Option<&str>) -> Result<Option<String>, AccessError> {
        let requested = requested.map(str::trim).filter(|s| !s.is_empty());
        if self.is_admin() {
            return Ok(requested.map(str::to_string));
        }
        let own = self.own_neighborhood()?;
        match requested {
            Some(other) if other != own => Err(AccessError::Forbidden(
                "neighborhood outside caller scope".into(),
            )),
            _ => Ok(Some(own.to_string())),
        }
    }

    pub fn can_view_registration(&self, detail: &RegistrationDetail) -> bool {
        match self.role {
            Role::Administrator => true,
            Role::NeighborhoodRepresentative => {
                self.can_view_neighborhood(&detail.record.neighborhood_id)
            }
            Role::RegisteredUser => detail.record.registered_by == self.user_id,
        }
    }

    /// Contact fields may be edited by admins, the neighborhood's representative,
    /// or the user who filed the registration.
    pub fn can_edit_registration(&self, detail: &RegistrationDetail) -> bool {
        self.can_view_registration(detail)
    }

    /// Decide how much of a conflicting record to reveal.
    pub fn disclose(&self, existing: Option<&ExistingRecord>) -> Disclosure {
        let Some(existing) = existing else {
            return Disclosure::default();
        };
        let name = match self.role {
            Role::Administrator => Some(existing.full_name()),
            Role::NeighborhoodRepresentative
                if self.neighborhood_id.as_deref() == Some(existing.neighborhood_id.as_str()) =>
            {
                Some(existing.full_name())
            }
            _ => None,
        };
        Disclosure {
            neighborhood: Some(existing.neighborhood_name.clone()),
            name,
        }
    }
}
