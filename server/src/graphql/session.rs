use async_graphql::SimpleObject;
use platform_authn::{CredentialGate, SessionConfig, issue_token};

use crate::graphql::GraphqlData;

/// Authenticated caller, attached to the request by the HTTP layer.
#[derive(Clone, Debug)]
pub struct RequestUser {
    pub username: String,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct AuthPayload {
    pub ok: bool,
    pub token: Option<String>,
    pub error: Option<String>,
}

impl AuthPayload {
    fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            token: None,
            error: Some(message.into()),
        }
    }

    pub fn attempt(data: &GraphqlData, username: &str, password: &str) -> Self {
        let Some(gate) = data.gate.as_ref() else {
            return Self::rejected("Login is disabled");
        };
        match login(gate, &data.session, username, password) {
            Ok(token) => Self {
                ok: true,
                token: Some(token),
                error: None,
            },
            Err(err) => Self::rejected(err.to_string()),
        }
    }
}

fn login(
    gate: &CredentialGate,
    session: &SessionConfig,
    username: &str,
    password: &str,
) -> Result<String, platform_authn::AuthnError> {
    gate.verify(username, password)?;
    issue_token(gate.username(), session)
}

#[derive(Clone, Debug, SimpleObject)]
pub struct SessionPayload {
    pub username: Option<String>,
    pub login_required: bool,
}

impl SessionPayload {
    pub fn from_requester(data: &GraphqlData, user: Option<&RequestUser>) -> Self {
        Self {
            username: user.map(|u| u.username.clone()),
            login_required: data.gate.is_some(),
        }
    }
}
