// Terminal output for the gantry subcommands.
// Human-readable chatter goes to stderr; stdout is reserved for captured step
// output and machine-readable reports.

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const BOLD_RED: &str = "\x1b[1;31m";
const GREEN: &str = "\x1b[32m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD_CYAN: &str = "\x1b[1;36m";
const RESET: &str = "\x1b[0m";

/// Workflow-level banner: "==> message"
pub fn banner(message: &str) {
    eprintln!("{}==> {}{}", BOLD, message, RESET);
}

/// Right-aligned action label: "     Parsing ci.yml"
pub fn status(action: &str, message: &str) {
    eprintln!("{}{:>12}{} {}", BOLD_CYAN, action, RESET, message);
}

/// Final verdict for a whole run or validation.
pub fn verdict(ok: bool, message: &str) {
    if ok {
        eprintln!("{}  \u{2713}{} {}", BOLD_GREEN, RESET, message);
    } else {
        eprintln!("{}  \u{2717}{} {}", BOLD_RED, RESET, message);
    }
}

/// One passed validation check.
pub fn check(message: &str) {
    eprintln!("{}  \u{2713}{} {}", GREEN, RESET, message);
}

pub fn warning(message: &str) {
    eprintln!("{}  !{} {}", YELLOW, RESET, message);
}

pub fn error(message: &str) {
    eprintln!("{}error:{} {}", BOLD_RED, RESET, message);
}

pub fn info(message: &str) {
    eprintln!("{}  i{} {}", CYAN, RESET, message);
}

/// Completed job or step line, colored by how it ended.
pub fn outcome_line(ok: bool, line: &str) {
    let color = if ok { GREEN } else { RED };
    eprintln!("{}{}{}", color, line, RESET);
}

/// Muted detail line (axis assignments, identifiers).
pub fn detail(line: &str) {
    eprintln!("{}{}{}", DIM, line, RESET);
}

/// A line captured from a step's stdout, shown in the run gutter.
pub fn step_stdout(line: &str) {
    println!("      | {}", line);
}

/// A line captured from a step's stderr.
pub fn step_stderr(line: &str) {
    eprintln!("{}      | {}{}", RED, line, RESET);
}
