pub const OTP_SUBJECT: &str = "OTP Verification Email";
pub const PASSWORD_UPDATED_SUBJECT: &str = "Password for your account has been updated";

/// Greeting name derived from the local part of an address: `jane.doe42@x` -> `jane doe`.
pub fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .unwrap_or_default()
        .split('.')
        .map(|part| part.chars().filter(|c| !c.is_ascii_digit()).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn otp_email(code: &str, name: &str, ttl_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #333;">
  <h2>Verify your email</h2>
  <p>Dear {name},</p>
  <p>Use the following one-time code to finish creating your account:</p>
  <h1 style="letter-spacing: 4px;">{code}</h1>
  <p>This code is valid for {ttl_minutes} minutes. If you did not request it, you can ignore this email.</p>
</body>
</html>"#
    )
}

pub fn password_updated_email(email: &str, full_name: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; color: #333;">
  <h2>Password updated</h2>
  <p>Hey {full_name},</p>
  <p>The password for the account <strong>{email}</strong> was changed successfully.</p>
  <p>If you did not make this change, contact support immediately.</p>
</body>
</html>"#
    )
}
