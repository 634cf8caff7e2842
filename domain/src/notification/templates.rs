//! Email templates, one per notification type.

use crate::gateway::OutboundEmail;
use entity_api::notification_type::NotificationType;

const FOOTER: &str =
    "Your AI sales coach. You can manage notification preferences in your account settings.";

/// The parts of a template that differ between notification types.
struct Template {
    /// Greeting when the recipient's name is known
    named_heading: fn(&str) -> String,
    heading: &'static str,
    cta: &'static str,
}

fn template_for(notification_type: NotificationType) -> Template {
    match notification_type {
        NotificationType::CoachRecommendation => Template {
            named_heading: |name| format!("Hey {name},"),
            heading: "Hey there,",
            cta: "Start practicing",
        },
        NotificationType::DailyDigest => Template {
            named_heading: |name| format!("{name}'s daily summary"),
            heading: "Your daily summary",
            cta: "View dashboard",
        },
        NotificationType::PracticeReminder => Template {
            named_heading: |name| format!("{name}, time to practice"),
            heading: "Time to practice",
            cta: "Practice now",
        },
        NotificationType::WeaknessUpdate => Template {
            named_heading: |name| format!("{name}, skill update"),
            heading: "Skill profile update",
            cta: "View profile",
        },
        NotificationType::AssignmentCreated => Template {
            named_heading: |name| format!("{name}, new assignment"),
            heading: "New assignment",
            cta: "View assignment",
        },
        NotificationType::AssignmentOverdue => Template {
            named_heading: |name| format!("{name}, overdue assignment"),
            heading: "Assignment overdue",
            cta: "Complete now",
        },
        NotificationType::CriticalScore => Template {
            named_heading: |name| format!("{name}, a trainee needs attention"),
            heading: "A trainee needs attention",
            cta: "Review attempt",
        },
        NotificationType::DecliningTrend => Template {
            named_heading: |name| format!("{name}, a trainee is slipping"),
            heading: "Declining performance",
            cta: "Review attempts",
        },
        NotificationType::Achievement => Template {
            named_heading: |name| format!("{name}, your team has a win"),
            heading: "Team achievement",
            cta: "View results",
        },
    }
}

/// Renders the email for a notification. The subject is always the title.
pub fn render(
    notification_type: NotificationType,
    to_email: &str,
    to_name: Option<&str>,
    title: &str,
    body: &str,
    action_url: Option<&str>,
) -> OutboundEmail {
    let template = template_for(notification_type);
    let heading = match to_name {
        Some(name) if !name.trim().is_empty() => (template.named_heading)(name),
        _ => template.heading.to_string(),
    };

    let mut html = format!(
        "<html><body style=\"background-color:#f6f9fc\">\
         <div style=\"max-width:580px;margin:0 auto;background:#ffffff;padding:20px 32px 48px\">\
         <h1>{}</h1><p>{}</p>",
        escape(&heading),
        escape(body)
    );
    let mut text = format!("{heading}\n\n{body}\n");

    if let Some(url) = action_url {
        html.push_str(&format!(
            "<p style=\"text-align:center\"><a href=\"{}\">{}</a></p>",
            escape(url),
            template.cta
        ));
        text.push_str(&format!("\n{}: {url}\n", template.cta));
    }

    html.push_str(&format!("<hr/><p style=\"color:#8898aa\">{FOOTER}</p></div></body></html>"));
    text.push_str(&format!("\n--\n{FOOTER}\n"));

    OutboundEmail {
        to_email: to_email.to_string(),
        to_name: to_name.map(str::to_string),
        subject: title.to_string(),
        html,
        text,
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_recipient_gets_personal_heading_and_cta() {
        let email = render(
            NotificationType::PracticeReminder,
            "pat@example.com",
            Some("Pat"),
            "Time to practice!",
            "You have not practiced in 5 days.",
            Some("https://app.example.com/training"),
        );

        assert_eq!(email.subject, "Time to practice!");
        assert!(email.html.contains("<h1>Pat, time to practice</h1>"));
        assert!(email.html.contains("Practice now"));
        assert!(email.text.contains("Practice now: https://app.example.com/training"));
    }

    #[test]
    fn anonymous_recipient_without_link_has_no_cta() {
        let email = render(
            NotificationType::CoachRecommendation,
            "pat@example.com",
            None,
            "Your coach recommends...",
            "Try the pricing scenario",
            None,
        );

        assert!(email.html.contains("<h1>Hey there,</h1>"));
        assert!(!email.html.contains("<a "));
    }

    #[test]
    fn user_content_is_escaped() {
        let email = render(
            NotificationType::CriticalScore,
            "lee@example.com",
            Some("Lee"),
            "Low score",
            "<script>alert(1)</script>",
            None,
        );
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
    }
}
