//! Outbound email. SMTP settings are optional; without them the mailer is
//! disabled and sends become debug-level no-ops. Delivery failures are
//! logged and swallowed; email is never load-bearing for a request.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

use crate::config::Config;

pub struct Mailer {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: Option<Mailbox>,
    frontend_url: String,
}

impl Mailer {
    pub fn from_config(config: &Config) -> Self {
        let transport = match (&config.smtp_user, &config.smtp_pass) {
            (Some(user), Some(pass)) => {
                match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host) {
                    Ok(builder) => Some(
                        builder
                            .port(config.smtp_port)
                            .credentials(Credentials::new(user.clone(), pass.clone()))
                            .build(),
                    ),
                    Err(e) => {
                        warn!("SMTP transport setup failed: {e}");
                        None
                    }
                }
            }
            _ => None,
        };
        if transport.is_none() {
            debug!("SMTP not configured; outbound email disabled");
        }

        let from = config
            .smtp_user
            .as_ref()
            .and_then(|user| format!("Lumen <{user}>").parse().ok());

        Self {
            transport,
            from,
            frontend_url: config.frontend_url.clone(),
        }
    }

    pub async fn send_welcome(&self, name: &str, email: &str) {
        let body = welcome_body(name, &self.frontend_url);
        self.send(email, "Welcome to Lumen!", body).await;
    }

    pub async fn send_password_reset(&self, name: &str, email: &str, reset_token: &str) {
        let reset_url = format!("{}/reset-password?token={}", self.frontend_url, reset_token);
        let body = password_reset_body(name, &reset_url);
        self.send(email, "Reset Your Password - Lumen", body).await;
    }

    pub async fn send_password_changed(&self, name: &str, email: &str) {
        let body = password_changed_body(name);
        self.send(email, "Password Changed Successfully - Lumen", body)
            .await;
    }

    async fn send(&self, to: &str, subject: &str, html_body: String) {
        let (Some(transport), Some(from)) = (&self.transport, &self.from) else {
            debug!("email disabled; skipping '{subject}' to {to}");
            return;
        };

        let recipient: Mailbox = match to.parse() {
            Ok(mailbox) => mailbox,
            Err(e) => {
                warn!("invalid recipient address {to}: {e}");
                return;
            }
        };

        let message = match Message::builder()
            .from(from.clone())
            .to(recipient)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body)
        {
            Ok(message) => message,
            Err(e) => {
                warn!("failed to build email '{subject}': {e}");
                return;
            }
        };

        match transport.send(message).await {
            Ok(_) => info!("email '{subject}' sent to {to}"),
            Err(e) => warn!("failed to send email '{subject}' to {to}: {e}"),
        }
    }
}

fn welcome_body(name: &str, base_url: &str) -> String {
    format!(
        "<html><body style=\"font-family: sans-serif; color: #1f2933;\">\
         <h1>Welcome to Lumen, {name}!</h1>\
         <p>Thanks for signing up. Here is what you can do:</p>\
         <ul>\
         <li>Chat with multiple AI models (Llama, GPT-4, Mixtral)</li>\
         <li>Get AI feedback on your resume</li>\
         </ul>\
         <p><a href=\"{base_url}/dashboard\">Start chatting</a></p>\
         <p>Best regards,<br>The Lumen Team</p>\
         </body></html>"
    )
}

fn password_reset_body(name: &str, reset_url: &str) -> String {
    format!(
        "<html><body style=\"font-family: sans-serif; color: #1f2933;\">\
         <h1>Password Reset Request</h1>\
         <p>Hi {name},</p>\
         <p>We received a request to reset your password. Use the link below to choose a new one:</p>\
         <p><a href=\"{reset_url}\">Reset Password</a></p>\
         <p>This link expires in 1 hour. If you didn't request this, you can ignore this email.</p>\
         <p>Best regards,<br>The Lumen Team</p>\
         </body></html>"
    )
}

fn password_changed_body(name: &str) -> String {
    format!(
        "<html><body style=\"font-family: sans-serif; color: #1f2933;\">\
         <h1>Password Changed</h1>\
         <p>Hi {name},</p>\
         <p>Your password has been changed. You can now log in with your new password.</p>\
         <p>If you didn't make this change, please contact us immediately.</p>\
         <p>Best regards,<br>The Lumen Team</p>\
         </body></html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_body_embeds_url() {
        let body = password_reset_body("Ada", "https://app.example.com/reset-password?token=abc");
        assert!(body.contains("token=abc"));
        assert!(body.contains("Ada"));
    }

    #[test]
    fn test_welcome_body_links_dashboard() {
        let body = welcome_body("Ada", "https://app.example.com");
        assert!(body.contains("https://app.example.com/dashboard"));
    }
}
