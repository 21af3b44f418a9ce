//! Whoami command: shows the user resolved from the token claims.

use std::io::Write;

use anyhow::Result;
use shift_db::User;

pub fn run<W: Write>(writer: &mut W, user: &User, json: bool) -> Result<()> {
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(user)?)?;
        return Ok(());
    }

    writeln!(writer, "{} <{}>", user.name, user.email)?;
    writeln!(writer, "ID:     {}", user.id)?;
    writeln!(writer, "Role:   {}", user.role)?;
    if let Some(domain) = user.domain_name.as_deref().or(user.domain_id.as_deref()) {
        writeln!(writer, "Domain: {domain}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use shift_core::{Identity, Role};
    use shift_db::Database;

    use insta::assert_snapshot;

    #[test]
    fn shows_name_role_and_domain() {
        let mut db = Database::open_in_memory().unwrap();
        let user = db
            .create_user(&Identity {
                email: "ana@acme.test".to_string(),
                name: "Ana".to_string(),
                role: Role::Admin,
                domain_id: Some("d-1".to_string()),
                domain_name: Some("Acme".to_string()),
            })
            .unwrap();
        let mut output = Vec::new();

        run(&mut output, &user, false).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @r"
        Ana <ana@acme.test>
        ID:     1
        Role:   admin
        Domain: Acme
        ");
    }
}
