// Participant parsing is core logic - it has no idea where the raw text came
// from (a file today, could be a paste box or an API payload tomorrow).

/// One certificate recipient, produced from a single `Name, email` input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub name: String,
    pub email: String,
}

/// Minimal syntactic email check: both `@` and `.` must be present.
/// Deliberately not RFC-grade - the mail relay is the real validator.
pub fn is_valid_email(email: &str) -> bool {
    email.contains('@') && email.contains('.')
}

/// Parses raw multi-line `Name, email` text into participants.
///
/// Each non-empty line is split on its first comma into a name and an email
/// field, both trimmed. Lines without a comma, or with an email that fails
/// [`is_valid_email`], are skipped silently; the caller treats an empty
/// result as unusable input. Input order is preserved.
///
/// Commas inside names are not supported - everything after the first comma
/// is the email field.
pub fn parse_participants(raw: &str) -> Vec<Participant> {
    let mut participants = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some((name, email)) = line.split_once(',') else {
            continue;
        };

        let email = email.trim();
        if !is_valid_email(email) {
            continue;
        }

        participants.push(Participant {
            name: name.trim().to_string(),
            email: email.to_string(),
        });
    }

    participants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_well_formed_lines_in_order() {
        let raw = "Budi Santoso, budi@example.com\nSiti Aminah, siti@example.com";
        let participants = parse_participants(raw);

        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].name, "Budi Santoso");
        assert_eq!(participants[0].email, "budi@example.com");
        assert_eq!(participants[1].name, "Siti Aminah");
    }

    #[test]
    fn test_skips_malformed_middle_line() {
        let raw = "Budi Santoso, budi@example.com\nBad Line\nSiti, siti@example.com";
        let participants = parse_participants(raw);

        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].name, "Budi Santoso");
        assert_eq!(participants[1].name, "Siti");
    }

    #[test]
    fn test_skips_invalid_email() {
        let raw = "Budi, not-an-email\nSiti, siti@example.com";
        let participants = parse_participants(raw);

        assert_eq!(participants.len(), 1);
        assert_eq!(participants[0].email, "siti@example.com");
    }

    #[test]
    fn test_never_yields_more_than_input_lines() {
        let raw = "a, a@b.c\n\n\nb, b@c.d\njunk";
        let participants = parse_participants(raw);
        assert!(participants.len() <= raw.lines().count());
        assert_eq!(participants.len(), 2);
    }

    #[test]
    fn test_empty_input_yields_empty() {
        assert!(parse_participants("").is_empty());
        assert!(parse_participants("\n  \n").is_empty());
    }

    #[test]
    fn test_email_check() {
        assert!(is_valid_email("budi@example.com"));
        assert!(!is_valid_email("budi@example"));
        assert!(!is_valid_email("budi.example.com"));
    }
}
