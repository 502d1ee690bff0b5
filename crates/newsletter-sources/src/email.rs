//! Newsletter delivery over SMTP.

use std::str::FromStr;

use lettre::{
    Address, Message, SmtpTransport, Transport,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use tracing::info;

use crate::error::SourceError;

/// Delivers one HTML email. Blocking; call from a blocking context.
pub trait SendEmail: Send + Sync {
    fn send_email(&self, subject: &str, to_email: &str, html: String) -> Result<(), SourceError>;
}

/// SMTP connection settings.
///
/// Env contract:
/// - host: `SMTP_HOST` (fallback `SMTP`) required
/// - port: `SMTP_PORT` (default `587`)
/// - user: `SMTP_USERNAME` optional
/// - pass: `SMTP_PASSWORD` optional, required together with the user
/// - secure: `SMTP_SECURE` (`true/false`, default `true`)
#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub secure: bool,
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl SmtpSettings {
    pub fn from_env() -> Result<Self, SourceError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SourceError> {
        let first = |keys: &[&str]| {
            keys.iter().find_map(|k| {
                lookup(k)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            })
        };
        let host = first(&["SMTP_HOST", "SMTP"])
            .ok_or_else(|| SourceError::Email("missing SMTP host env var (SMTP_HOST)".into()))?;
        let port = match first(&["SMTP_PORT"]) {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| SourceError::Email(format!("invalid SMTP_PORT {raw:?}: {e}")))?,
            None => 587,
        };
        let username = first(&["SMTP_USERNAME"]);
        let password = first(&["SMTP_PASSWORD"]);
        if username.is_some() != password.is_some() {
            return Err(SourceError::Email(
                "set both SMTP_USERNAME and SMTP_PASSWORD".into(),
            ));
        }
        let secure = first(&["SMTP_SECURE"])
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(true);
        Ok(Self {
            host,
            port,
            username,
            password,
            secure,
        })
    }
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("secure", &self.secure)
            .finish()
    }
}

fn parse_address(address: &str) -> Result<Address, SourceError> {
    Address::from_str(address.trim()).map_err(|e| SourceError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// SMTP mailer with a fixed sender.
pub struct SmtpMailer {
    settings: SmtpSettings,
    from: Mailbox,
    reply_to: Mailbox,
}

impl SmtpMailer {
    /// `reply_to` defaults to the sender when absent or blank.
    pub fn new(
        settings: SmtpSettings,
        from_email: &str,
        from_name: Option<String>,
        reply_to: Option<&str>,
    ) -> Result<Self, SourceError> {
        let from = Mailbox::new(from_name, parse_address(from_email)?);
        let reply_to = match reply_to.map(str::trim).filter(|r| !r.is_empty()) {
            Some(address) => Mailbox::new(None, parse_address(address)?),
            None => from.clone(),
        };
        Ok(Self {
            settings,
            from,
            reply_to,
        })
    }

    pub fn build_message(
        &self,
        subject: &str,
        to_email: &str,
        html: String,
    ) -> Result<Message, SourceError> {
        Message::builder()
            .from(self.from.clone())
            .reply_to(self.reply_to.clone())
            .to(Mailbox::new(None, parse_address(to_email)?))
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| SourceError::Email(e.to_string()))
    }

    fn transport(&self) -> Result<SmtpTransport, SourceError> {
        let mut builder = if self.settings.secure {
            SmtpTransport::relay(&self.settings.host)
                .map_err(|e| SourceError::Email(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&self.settings.host)
        };
        builder = builder.port(self.settings.port);
        if let (Some(username), Some(password)) = (&self.settings.username, &self.settings.password)
        {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(builder.build())
    }
}

impl SendEmail for SmtpMailer {
    fn send_email(&self, subject: &str, to_email: &str, html: String) -> Result<(), SourceError> {
        let message = self.build_message(subject, to_email, html)?;
        let response = self
            .transport()?
            .send(&message)
            .map_err(|e| SourceError::Email(e.to_string()))?;
        info!(
            event = "email.sent",
            to_domain = to_email.rsplit_once('@').map(|(_, d)| d).unwrap_or("unknown"),
            code = %response.code(),
            "newsletter sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn header_line<'a>(raw: &'a str, name: &str) -> &'a str {
        raw.lines()
            .find_map(|line| line.strip_prefix(&format!("{name}: ")))
            .unwrap_or_default()
    }

    fn settings() -> SmtpSettings {
        SmtpSettings::from_lookup(lookup(&[("SMTP_HOST", "smtp.example.com")])).expect("settings")
    }

    #[test]
    fn settings_default_to_secure_submission_port() {
        let s = settings();
        assert_eq!(s.port, 587);
        assert!(s.secure);
        assert!(s.username.is_none());
    }

    #[test]
    fn settings_validate_host_port_and_credentials() {
        assert!(SmtpSettings::from_lookup(lookup(&[])).is_err());
        assert!(
            SmtpSettings::from_lookup(lookup(&[("SMTP_HOST", "h"), ("SMTP_PORT", "nope")]))
                .is_err()
        );
        assert!(
            SmtpSettings::from_lookup(lookup(&[("SMTP_HOST", "h"), ("SMTP_USERNAME", "u")]))
                .is_err()
        );
        let s = SmtpSettings::from_lookup(lookup(&[
            ("SMTP_HOST", "h"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USERNAME", "u"),
            ("SMTP_PASSWORD", "p"),
            ("SMTP_SECURE", "off"),
        ]))
        .expect("settings");
        assert_eq!(s.port, 2525);
        assert!(!s.secure);
        assert!(!format!("{s:?}").contains("\"p\""));
    }

    #[test]
    fn message_carries_sender_reply_to_and_html() {
        let mailer = SmtpMailer::new(
            settings(),
            "newsletter@example.com",
            Some("Daily Digest".into()),
            Some("replies@example.com"),
        )
        .expect("mailer");
        let message = mailer
            .build_message("Daily Digest - June 10, 2025", "reader@example.org", "<h1>Hi</h1>".into())
            .expect("message");
        let raw = String::from_utf8(message.formatted()).expect("utf8");
        let from = header_line(&raw, "From");
        assert!(from.contains("Daily Digest") && from.contains("newsletter@example.com"));
        assert!(header_line(&raw, "Reply-To").contains("replies@example.com"));
        assert!(header_line(&raw, "To").contains("reader@example.org"));
        assert!(header_line(&raw, "Content-Type").starts_with("text/html"));
    }

    #[test]
    fn blank_reply_to_falls_back_to_sender() {
        let mailer =
            SmtpMailer::new(settings(), "newsletter@example.com", None, Some("  ")).expect("mailer");
        let raw = String::from_utf8(
            mailer
                .build_message("s", "reader@example.org", String::new())
                .expect("message")
                .formatted(),
        )
        .expect("utf8");
        assert!(header_line(&raw, "Reply-To").contains("newsletter@example.com"));
    }

    #[test]
    fn invalid_recipient_is_reported() {
        let mailer = SmtpMailer::new(settings(), "newsletter@example.com", None, None).expect("mailer");
        let err = mailer
            .build_message("s", "not-an-address", String::new())
            .expect_err("invalid");
        assert!(matches!(err, SourceError::InvalidAddress { .. }));
    }
}
