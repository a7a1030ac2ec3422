use crate::store::VerificationMethod;

pub(crate) struct VerifyPrompt {
    pub title: String,
    pub description: String,
}

fn action_hint(method: VerificationMethod) -> &'static str {
    match method {
        VerificationMethod::Passcode => "Enter your passcode to continue.",
        _ => "Press OK to continue, or Cancel to deny.",
    }
}

pub(crate) fn registration_prompt(
    rp_id: &str,
    rp_name: &str,
    user_display: &str,
    method: VerificationMethod,
) -> VerifyPrompt {
    let site = if rp_name == rp_id {
        rp_id.to_string()
    } else {
        format!("{rp_name} ({rp_id})")
    };
    VerifyPrompt {
        title: "passrite".to_string(),
        description: format!(
            "Register new passkey\n\nSite: {site}\nAccount: {user_display}\n\n{}",
            action_hint(method)
        ),
    }
}

pub(crate) fn authentication_prompt(
    rp_id: &str,
    user_display: Option<&str>,
    method: VerificationMethod,
) -> VerifyPrompt {
    let account = user_display.unwrap_or("(unknown)");
    VerifyPrompt {
        title: "passrite".to_string(),
        description: format!(
            "Sign in with passkey\n\nSite: {rp_id}\nAccount: {account}\n\n{}",
            action_hint(method)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_prompt_names_site_and_account() {
        let p = registration_prompt("example.com", "Example", "Alice", VerificationMethod::Platform);
        assert!(p.description.contains("Site: Example (example.com)"));
        assert!(p.description.contains("Account: Alice"));
        assert!(p.description.contains("Press OK"));
    }

    #[test]
    fn authentication_prompt_without_account() {
        let p = authentication_prompt("example.com", None, VerificationMethod::Passcode);
        assert!(p.description.contains("Account: (unknown)"));
        assert!(p.description.contains("passcode"));
    }
}
