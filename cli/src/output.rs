use colored::Colorize;

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn subheader(title: &str) {
    println!("{}", title.bold());
}

pub fn hint(msg: &str) {
    println!("{} {}", "hint:".cyan().bold(), msg.dimmed());
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "info:".blue().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Indented `label value` line.
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{}:", label).dimmed(), value.to_string().cyan());
}

/// Success/failure tally for one cost center.
pub fn tally(name: &str, ok: usize, failed: usize) {
    let marker = if failed == 0 { "✓".green() } else { "✗".red() };
    let failed_text = if failed == 0 {
        failed.to_string().dimmed()
    } else {
        failed.to_string().red()
    };
    println!(
        "  {} {} {} ok, {} failed",
        marker,
        name,
        ok.to_string().green(),
        failed_text
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_does_not_panic() {
        header("Test Header");
    }

    #[test]
    fn test_subheader_does_not_panic() {
        subheader("Test Subheader");
    }

    #[test]
    fn test_hint_does_not_panic() {
        hint("This is a hint");
    }

    #[test]
    fn test_info_does_not_panic() {
        info("This is info");
    }

    #[test]
    fn test_warn_does_not_panic() {
        warn("This is a warning");
    }

    #[test]
    fn test_error_does_not_panic() {
        error("This is an error");
    }

    #[test]
    fn test_success_does_not_panic() {
        success("This is success");
    }

    #[test]
    fn test_field_and_tally_do_not_panic() {
        field("Enterprise", "acme");
        tally("Platform", 3, 0);
        tally("Data", 1, 2);
    }
}
