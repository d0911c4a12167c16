// Licence tiers and the premium instrument gate.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WindError};
use crate::instrument::Instrument;

/// Ordered from least to most privileged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Free,
    Trial,
    Licensed,
}

impl UserType {
    pub fn label(self) -> &'static str {
        match self {
            UserType::Free => "FREE",
            UserType::Trial => "TRIAL",
            UserType::Licensed => "LICENSED",
        }
    }
}

/// Events that move a session up the licence ladder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LicenseEvent {
    SignupCompleted,  // free -> trial
    PaymentSucceeded, // trial -> licensed
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_type: UserType,
    pub is_admin: bool,
}

impl Session {
    pub fn new(user_type: UserType) -> Self {
        Self {
            user_type,
            is_admin: false,
        }
    }

    pub fn admin() -> Self {
        Self {
            user_type: UserType::Licensed,
            is_admin: true,
        }
    }

    pub fn apply(&mut self, event: LicenseEvent) -> Result<UserType> {
        let (from, to) = match event {
            LicenseEvent::SignupCompleted => (UserType::Free, UserType::Trial),
            LicenseEvent::PaymentSucceeded => (UserType::Trial, UserType::Licensed),
        };
        if self.user_type != from {
            return Err(WindError::InvalidTransition {
                from: self.user_type,
                to,
            });
        }
        self.user_type = to;
        tracing::info!(?from, ?to, "licence upgraded");
        Ok(to)
    }

    /// Downgrade a licence. Only an administrator may do this, and only
    /// downwards; nothing in the engine ever revokes on its own.
    pub fn revoke(&mut self, actor: &Session, to: UserType) -> Result<()> {
        if !actor.is_admin {
            return Err(WindError::PermissionDenied);
        }
        if to >= self.user_type {
            return Err(WindError::InvalidTransition {
                from: self.user_type,
                to,
            });
        }
        tracing::info!(from = ?self.user_type, ?to, "licence revoked");
        self.user_type = to;
        Ok(())
    }
}

/// Whether `session` may play `instrument`. Free users can still select and
/// inspect premium instruments; they just can't hear them.
pub fn can_access(instrument: &Instrument, session: &Session) -> bool {
    !instrument.premium || matches!(session.user_type, UserType::Trial | UserType::Licensed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::Catalog;

    fn instrument(premium: bool) -> Instrument {
        let catalog = Catalog::builtin().unwrap();
        catalog
            .instruments()
            .iter()
            .find(|i| i.premium == premium)
            .cloned()
            .unwrap()
    }

    #[test]
    fn premium_needs_trial_or_licence() {
        let premium = instrument(true);
        assert!(!can_access(&premium, &Session::new(UserType::Free)));
        assert!(can_access(&premium, &Session::new(UserType::Trial)));
        assert!(can_access(&premium, &Session::new(UserType::Licensed)));
    }

    #[test]
    fn free_instruments_are_open_to_all() {
        let free = instrument(false);
        for t in [UserType::Free, UserType::Trial, UserType::Licensed] {
            assert!(can_access(&free, &Session::new(t)));
        }
    }

    #[test]
    fn access_is_monotonic_in_tier() {
        let tiers = [UserType::Free, UserType::Trial, UserType::Licensed];
        for premium in [false, true] {
            let inst = instrument(premium);
            for (i, lower) in tiers.iter().enumerate() {
                for higher in &tiers[i..] {
                    if can_access(&inst, &Session::new(*lower)) {
                        assert!(can_access(&inst, &Session::new(*higher)));
                    }
                }
            }
        }
    }

    #[test]
    fn admin_flag_does_not_bypass_gate() {
        let premium = instrument(true);
        let session = Session {
            user_type: UserType::Free,
            is_admin: true,
        };
        assert!(!can_access(&premium, &session));
    }

    #[test]
    fn upgrade_path() {
        let mut s = Session::default();
        assert_eq!(s.apply(LicenseEvent::SignupCompleted).unwrap(), UserType::Trial);
        assert_eq!(s.apply(LicenseEvent::PaymentSucceeded).unwrap(), UserType::Licensed);
    }

    #[test]
    fn out_of_order_events_are_rejected() {
        let mut s = Session::default();
        assert!(matches!(
            s.apply(LicenseEvent::PaymentSucceeded),
            Err(WindError::InvalidTransition { .. })
        ));
        assert_eq!(s.user_type, UserType::Free);

        let mut licensed = Session::new(UserType::Licensed);
        assert!(licensed.apply(LicenseEvent::SignupCompleted).is_err());
        assert_eq!(licensed.user_type, UserType::Licensed);
    }

    #[test]
    fn only_admins_revoke_and_only_downwards() {
        let mut s = Session::new(UserType::Licensed);
        assert!(matches!(
            s.revoke(&Session::new(UserType::Licensed), UserType::Free),
            Err(WindError::PermissionDenied)
        ));
        assert!(s.revoke(&Session::admin(), UserType::Licensed).is_err());
        s.revoke(&Session::admin(), UserType::Trial).unwrap();
        assert_eq!(s.user_type, UserType::Trial);
        s.revoke(&Session::admin(), UserType::Free).unwrap();
        assert_eq!(s.user_type, UserType::Free);
    }

    #[test]
    fn session_json_uses_camel_case() {
        let json = serde_json::to_string(&Session::new(UserType::Trial)).unwrap();
        assert_eq!(json, r#"{"userType":"trial","isAdmin":false}"#);
    }
}
