//! HTML email templates
//!
//! Every email shares one responsive layout (600px container, inline-safe
//! styles for Gmail, Outlook and Apple Mail). Values interpolated into the
//! markup are HTML-escaped.

use chrono::{Datelike, Utc};

const STYLES: &str = r#"
        table, td, div, h1, p { font-family: 'Segoe UI', 'Helvetica Neue', Arial, sans-serif; }
        body { margin: 0; padding: 0; background-color: #f4f6f8; }
        .container {
            width: 100%;
            max-width: 600px;
            margin: 0 auto;
            background-color: #ffffff;
            border-radius: 12px;
            overflow: hidden;
            box-shadow: 0 4px 12px rgba(0, 0, 0, 0.05);
        }
        .header {
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            padding: 30px;
            text-align: center;
        }
        .header h1 { color: #ffffff; margin: 0; font-size: 26px; font-weight: 700; letter-spacing: 0.5px; }
        .content { padding: 40px 30px; color: #4a5568; font-size: 16px; line-height: 1.6; }
        .btn {
            display: inline-block;
            padding: 14px 30px;
            margin: 20px 0;
            background-color: #764ba2;
            color: #ffffff !important;
            text-decoration: none;
            border-radius: 8px;
            font-weight: 600;
            font-size: 16px;
            box-shadow: 0 4px 6px rgba(118, 75, 162, 0.2);
        }
        .btn:hover { background-color: #5b3a7d; }
        .footer { background-color: #f8fafc; padding: 24px; text-align: center; border-top: 1px solid #edf2f7; }
        .footer p { margin: 5px 0; color: #a0aec0; font-size: 13px; }
        .link { color: #764ba2; text-decoration: none; }
        @media only screen and (max-width:480px) {
            .content { padding: 25px 20px; }
            .header { padding: 25px; }
        }
"#;

/// Escape text for use in HTML element content and double-quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders the transactional emails
#[derive(Debug, Clone)]
pub struct EmailTemplates {
    client_url: String,
    app_name: String,
}

impl EmailTemplates {
    pub fn new(client_url: impl Into<String>, app_name: impl Into<String>) -> Self {
        let client_url = client_url.into().trim_end_matches('/').to_string();
        Self {
            client_url,
            app_name: app_name.into(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Absolute link into the web client, e.g. `link("/profile")`
    pub fn link(&self, path: &str) -> String {
        format!("{}/{}", self.client_url, path.trim_start_matches('/'))
    }

    /// Wrap `content` (already safe HTML) in the shared layout
    pub fn layout(&self, title: &str, content: &str) -> String {
        let app = escape_html(&self.app_name);
        let mut html = String::with_capacity(STYLES.len() + content.len() + 2048);

        html.push_str("<!DOCTYPE html>\n");
        html.push_str(r#"<html lang="en" xmlns="http://www.w3.org/1999/xhtml" xmlns:o="urn:schemas-microsoft-com:office:office">"#);
        html.push_str("\n<head>\n");
        html.push_str("    <meta charset=\"UTF-8\">\n");
        html.push_str("    <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\n");
        html.push_str("    <meta name=\"x-apple-disable-message-reformatting\">\n");
        html.push_str(&format!("    <title>{}</title>\n", escape_html(title)));
        html.push_str("    <!--[if mso]><noscript><xml><o:OfficeDocumentSettings><o:PixelsPerInch>96</o:PixelsPerInch></o:OfficeDocumentSettings></xml></noscript><![endif]-->\n");
        html.push_str("    <style>");
        html.push_str(STYLES);
        html.push_str("    </style>\n</head>\n");
        html.push_str("<body style=\"margin:0;padding:0;\">\n");
        html.push_str("    <div style=\"padding: 20px 0;\">\n        <div class=\"container\">\n");
        html.push_str(&format!(
            "            <div class=\"header\">\n                <h1>{}</h1>\n            </div>\n",
            app
        ));
        html.push_str("            <div class=\"content\">\n");
        html.push_str(content);
        html.push_str("\n            </div>\n");
        html.push_str(&format!(
            concat!(
                "            <div class=\"footer\">\n",
                "                <p>&copy; {year} {app}. All rights reserved.</p>\n",
                "                <p>\n",
                "                    <a href=\"{privacy}\">Privacy Policy</a> |\n",
                "                    <a href=\"{terms}\">Terms of Service</a>\n",
                "                </p>\n",
                "            </div>\n"
            ),
            year = Utc::now().year(),
            app = app,
            privacy = escape_html(&self.link("/privacy")),
            terms = escape_html(&self.link("/terms")),
        ));
        html.push_str("        </div>\n    </div>\n</body>\n</html>\n");
        html
    }

    pub fn welcome(&self, username: &str, cta_link: &str) -> String {
        let username = escape_html(username);
        let app = escape_html(&self.app_name);
        let cta = escape_html(cta_link);
        let content = format!(
            r#"<h2 style="color: #2d3748; margin-top: 0;">Welcome to the Community, {username}! 🎉</h2>
<p>Welcome to <strong>{app}</strong>! 🚀</p>
<p>We're thrilled to have you join our community of writers and readers.</p>
<p>Start exploring, sharing your stories, and connecting with like-minded individuals.</p>
<div style="text-align: center;">
    <a href="{cta}" class="btn">Start Exploring</a>
</div>
<p style="font-size: 14px; color: #718096; margin-top: 20px;">
    If the button above doesn't work, copy this link into your browser:
    <a href="{cta}" class="link">{cta}</a>
</p>"#
        );
        self.layout(&format!("Welcome to {}", self.app_name), &content)
    }

    pub fn password_reset(&self, username: &str, reset_link: &str) -> String {
        let username = escape_html(username);
        let link = escape_html(reset_link);
        let content = format!(
            r#"<h2 style="color: #2d3748; margin-top: 0;">Reset Your Password 🔒</h2>
<p>Hi {username},</p>
<p>We received a request to reset the password for your account.</p>
<p>Please click the button below to restore access. This link is valid for <strong>1 hour</strong>.</p>
<div style="text-align: center;">
    <a href="{link}" class="btn">Reset Password</a>
</div>
<p style="font-size: 14px; color: #718096;">
    If you didn't ask for this, you can safely ignore this email. Your password won't change.
</p>
<hr style="border: 0; border-top: 1px solid #eee; margin: 20px 0;">
<p style="font-size: 13px; color: #a0aec0; word-break: break-all;">
    Or copy this link: <br>
    <a href="{link}" class="link">{link}</a>
</p>"#
        );
        self.layout("Password Reset Request", &content)
    }

    pub fn login_alert(
        &self,
        username: &str,
        time: &str,
        ip: &str,
        device: Option<&str>,
        secure_account_link: &str,
    ) -> String {
        let username = escape_html(username);
        let time = escape_html(time);
        let ip = escape_html(ip);
        let link = escape_html(secure_account_link);
        let device = device
            .map(|d| {
                format!(
                    r#"<p style="margin: 5px 0;"><strong>Device:</strong> {}</p>"#,
                    escape_html(d)
                )
            })
            .unwrap_or_default();
        let content = format!(
            r#"<h2 style="color: #2d3748; margin-top: 0;">New Login Detected ⚠️</h2>
<p>Hi {username},</p>
<p>We noticed a new login to your account from a new device.</p>
<div style="background-color: #fff5f5; border-left: 4px solid #fc8181; padding: 15px; margin: 20px 0; border-radius: 4px;">
    <p style="margin: 5px 0;"><strong>Time:</strong> {time}</p>
    <p style="margin: 5px 0;"><strong>IP Address:</strong> {ip}</p>
    {device}
</div>
<p>If this was you, you can ignore this email.</p>
<p><strong>If you don't recognize this activity</strong>, please secure your account immediately.</p>
<div style="text-align: center;">
    <a href="{link}" class="btn" style="background-color: #e53e3e; box-shadow: 0 4px 6px rgba(229, 62, 62, 0.2);">Secure My Account</a>
</div>"#
        );
        self.layout("Security Alert: New Login", &content)
    }

    pub fn password_update(&self, username: &str, contact_support_link: &str) -> String {
        let username = escape_html(username);
        let link = escape_html(contact_support_link);
        let content = format!(
            r#"<h2 style="color: #2d3748; margin-top: 0;">Password Changed</h2>
<p>Hi {username},</p>
<p>This email is to confirm that your password was successfully changed.</p>
<p>If you did not authorize this action, please contact our support team immediately to lock your account.</p>
<div style="text-align: center;">
    <a href="{link}" class="btn">Contact Support</a>
</div>"#
        );
        self.layout("Your password has been changed", &content)
    }

    pub fn profile_update(&self, username: &str, profile_link: &str) -> String {
        let username = escape_html(username);
        let link = escape_html(profile_link);
        let content = format!(
            r#"<h2 style="color: #2d3748; margin-top: 0;">Profile Updated</h2>
<p>Hi {username},</p>
<p>Your profile information has been successfully updated.</p>
<div style="text-align: center;">
    <a href="{link}" class="btn">View Profile</a>
</div>
<p style="font-size: 14px; color: #718096;">
    If you didn't make these changes, please check your account security settings.
</p>"#
        );
        self.layout("Profile Information Updated", &content)
    }

    pub fn otp_verify(&self, otp: &str) -> String {
        let otp = escape_html(otp);
        let content = format!(
            r#"<h2 style="color: #2d3748; margin-top: 0;">Verify Account</h2>
<p>Hi,</p>
<p>Use the One Time Password (OTP) below to verify your email address and complete registration.</p>
<div style="text-align: center; margin: 30px 0;">
    <span style="font-size: 32px; font-weight: bold; letter-spacing: 5px; color: #764ba2; background: #f4f6f8; padding: 10px 20px; border-radius: 8px;">{otp}</span>
</div>
<p style="font-size: 14px; color: #718096; text-align: center;">
    This OTP is valid for <strong>10 minutes</strong>. Do not share it with anyone.
</p>"#
        );
        self.layout("Verification Code", &content)
    }
}
