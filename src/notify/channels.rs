// src/notify/channels.rs
//
// Outbound push, email and SMS. Every client is built with the configured
// timeout so a slow provider cannot hold a request open.

use serde_json::{json, Value};

use crate::config::{NotifyConfig, SendGridConfig, TwilioConfig};

const FCM_ENDPOINT: &str = "https://fcm.googleapis.com/fcm/send";
const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";
const TWILIO_BASE: &str = "https://api.twilio.com/2010-04-01";

pub struct Channels {
    pub push: Option<FcmPush>,
    pub email: Option<SendGridEmail>,
    pub sms: Option<TwilioSms>,
}

impl Channels {
    pub fn from_config(cfg: &NotifyConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            push: cfg.fcm_server_key.clone().map(|server_key| FcmPush {
                client: client.clone(),
                server_key,
            }),
            email: cfg.sendgrid.clone().map(|cfg| SendGridEmail { client: client.clone(), cfg }),
            sms: cfg.twilio.clone().map(|cfg| TwilioSms { client, cfg }),
        })
    }

    pub fn disabled() -> Self {
        Self { push: None, email: None, sms: None }
    }
}

pub struct FcmPush {
    client: reqwest::Client,
    server_key: String,
}

impl FcmPush {
    pub async fn send(&self, tokens: &[String], title: &str, body: &str, data: &Value) -> Result<(), reqwest::Error> {
        self.client
            .post(FCM_ENDPOINT)
            .header(reqwest::header::AUTHORIZATION, format!("key={}", self.server_key))
            .json(&fcm_payload(tokens, title, body, data))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub fn fcm_payload(tokens: &[String], title: &str, body: &str, data: &Value) -> Value {
    json!({
        "registration_ids": tokens,
        "priority": "high",
        "notification": { "title": title, "body": body },
        "data": data,
    })
}

pub struct SendGridEmail {
    client: reqwest::Client,
    cfg: SendGridConfig,
}

impl SendGridEmail {
    pub async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), reqwest::Error> {
        self.client
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(&self.cfg.api_key)
            .json(&sendgrid_payload(&self.cfg.from_email, to, subject, html))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

pub fn sendgrid_payload(from: &str, to: &str, subject: &str, html: &str) -> Value {
    json!({
        "personalizations": [{ "to": [{ "email": to }] }],
        "from": { "email": from },
        "subject": subject,
        "content": [{ "type": "text/html", "value": html }],
    })
}

pub struct TwilioSms {
    client: reqwest::Client,
    cfg: TwilioConfig,
}

impl TwilioSms {
    pub async fn send(&self, to: &str, body: &str) -> Result<(), reqwest::Error> {
        let url = format!("{TWILIO_BASE}/Accounts/{}/Messages.json", self.cfg.account_sid);
        self.client
            .post(url)
            .basic_auth(&self.cfg.account_sid, Some(&self.cfg.auth_token))
            .form(&[("To", to), ("From", self.cfg.from_number.as_str()), ("Body", body)])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fcm_payload_targets_every_token() {
        let tokens = vec!["t1".to_string(), "t2".to_string()];
        let v = fcm_payload(&tokens, "Booking confirmed", "See you soon", &json!({ "bookingId": "b1" }));
        assert_eq!(v["registration_ids"], json!(["t1", "t2"]));
        assert_eq!(v["notification"]["title"], "Booking confirmed");
        assert_eq!(v["data"]["bookingId"], "b1");
    }

    #[test]
    fn sendgrid_payload_shape() {
        let v = sendgrid_payload("noreply@hotel.test", "guest@mail.test", "Hi", "<p>Hi</p>");
        assert_eq!(v["personalizations"][0]["to"][0]["email"], "guest@mail.test");
        assert_eq!(v["from"]["email"], "noreply@hotel.test");
        assert_eq!(v["content"][0]["type"], "text/html");
    }

    #[test]
    fn missing_credentials_disable_channels() {
        let cfg = NotifyConfig {
            timeout: Duration::from_secs(1),
            fcm_server_key: None,
            sendgrid: None,
            twilio: None,
        };
        let ch = Channels::from_config(&cfg).unwrap();
        assert!(ch.push.is_none() && ch.email.is_none() && ch.sms.is_none());
    }
}
