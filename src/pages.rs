use std::fmt::Write as _;

use serde_json::Value;

/// Presentation collaborator: turns a view name and a mapping of named values
/// into a page. Kept behind a trait so the handlers never know how pages are
/// produced.
pub trait PageRenderer: Send + Sync {
    fn render(&self, view: &str, ctx: &Value) -> anyhow::Result<String>;
}

/// Built-in renderer producing small self-contained HTML pages.
pub struct HtmlPages;

impl PageRenderer for HtmlPages {
    fn render(&self, view: &str, ctx: &Value) -> anyhow::Result<String> {
        let body = match view {
            "login" => login_body(),
            "signup" => signup_body(),
            "dashboard" => dashboard_body(ctx),
            "about" => about_body(),
            "contact" => contact_body(),
            other => anyhow::bail!("unknown view: {other}"),
        };
        Ok(layout(title_for(view), ctx, &body))
    }
}

fn title_for(view: &str) -> &'static str {
    match view {
        "login" => "Login",
        "signup" => "Sign Up",
        "dashboard" => "Dashboard",
        "about" => "About",
        "contact" => "Contact",
        _ => "NexGenHome",
    }
}

/// Minimal HTML escaping for values interpolated into pages.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn str_field<'a>(ctx: &'a Value, key: &str) -> Option<&'a str> {
    ctx.get(key).and_then(Value::as_str)
}

fn flash_block(ctx: &Value) -> String {
    let Some(flashes) = ctx.get("flashes").and_then(Value::as_array) else {
        return String::new();
    };
    if flashes.is_empty() {
        return String::new();
    }
    let mut out = String::from("<ul class=\"flashes\">\n");
    for flash in flashes {
        let level = flash.get("level").and_then(Value::as_str).unwrap_or("info");
        let message = flash.get("message").and_then(Value::as_str).unwrap_or("");
        let _ = writeln!(
            out,
            "  <li class=\"flash {}\">{}</li>",
            escape(level),
            escape(message)
        );
    }
    out.push_str("</ul>\n");
    out
}

fn layout(title: &str, ctx: &Value, body: &str) -> String {
    let logged_in = str_field(ctx, "username").is_some();
    let session_links = if logged_in {
        r#"<a href="/dashboard">Dashboard</a> <a href="/logout">Logout</a>"#
    } else {
        r#"<a href="/login">Login</a> <a href="/signup">Sign Up</a>"#
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} - NexGenHome</title>
</head>
<body>
<nav>
  <strong>NexGenHome</strong>
  <a href="/">Home</a> <a href="/about">About</a> <a href="/contact">Contact</a>
  {session_links}
</nav>
{flashes}<main>
{body}</main>
</body>
</html>
"#,
        title = escape(title),
        session_links = session_links,
        flashes = flash_block(ctx),
        body = body,
    )
}

fn login_body() -> String {
    r#"<h1>Login</h1>
<form method="post" action="/login">
  <label>Username or Email <input type="text" name="username"></label>
  <label>Password <input type="password" name="password"></label>
  <button type="submit">Login</button>
</form>
<p>New here? <a href="/signup">Create an account</a>.</p>
"#
    .to_string()
}

fn signup_body() -> String {
    r#"<h1>Sign Up</h1>
<form method="post" action="/signup">
  <label>Username <input type="text" name="username"></label>
  <label>Email <input type="email" name="email"></label>
  <label>Password <input type="password" name="password"></label>
  <button type="submit">Sign Up</button>
</form>
<p>Already registered? <a href="/login">Log in</a>.</p>
"#
    .to_string()
}

fn dashboard_body(ctx: &Value) -> String {
    let username = str_field(ctx, "username").unwrap_or("guest");
    let mut body = format!("<h1>Welcome, {}!</h1>\n", escape(username));
    if let Some(latest) = str_field(ctx, "latest_user") {
        let _ = writeln!(body, "<p>Newest member: {}</p>", escape(latest));
    }
    body.push_str("<p>Your smart home at a glance.</p>\n");
    body
}

fn about_body() -> String {
    r#"<h1>About</h1>
<p>NexGenHome is a smart home portal for managing your connected rooms.</p>
"#
    .to_string()
}

fn contact_body() -> String {
    r#"<h1>Contact</h1>
<p>Reach the NexGenHome team at support@nexgenhome.example.</p>
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_known_views() {
        let pages = HtmlPages;
        for view in ["login", "signup", "about", "contact"] {
            let html = pages.render(view, &json!({})).unwrap();
            assert!(html.contains("NexGenHome"), "{view} missing layout");
        }
    }

    #[test]
    fn unknown_view_is_an_error() {
        let err = HtmlPages.render("nope", &json!({})).unwrap_err();
        assert!(err.to_string().contains("unknown view"));
    }

    #[test]
    fn dashboard_escapes_the_username() {
        let html = HtmlPages
            .render("dashboard", &json!({"username": "<script>alert(1)</script>"}))
            .unwrap();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn flashes_appear_in_the_page() {
        let html = HtmlPages
            .render(
                "login",
                &json!({"flashes": [{"level": "error", "message": "Invalid username/email or password."}]}),
            )
            .unwrap();
        assert!(html.contains("Invalid username/email or password."));
        assert!(html.contains("class=\"flash error\""));
    }
}
