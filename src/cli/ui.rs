use std::fmt::Display;
use std::io::{self, IsTerminal};

use crossterm::style::{StyledContent, Stylize};

fn paint<D: Display>(styled: StyledContent<D>) -> String {
    render(styled, io::stderr().is_terminal())
}

fn paint_stdout<D: Display>(styled: StyledContent<D>) -> String {
    render(styled, io::stdout().is_terminal())
}

fn render<D: Display>(styled: StyledContent<D>, colored: bool) -> String {
    if colored {
        styled.to_string()
    } else {
        styled.content().to_string()
    }
}

pub fn print_step(message: &str) {
    eprintln!("{} {}", paint("==>".cyan().bold()), message);
}

pub fn print_success(message: &str) {
    eprintln!("{} {}", paint("[ok]".green().bold()), message);
}

pub fn print_warn(message: &str) {
    eprintln!("{} {}", paint("[warning]".yellow().bold()), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", paint("[error]".red().bold()), message);
}

pub fn print_hint(message: &str) {
    eprintln!("  {} {}", paint("hint:".dark_grey()), message);
}

pub fn print_diagnostics(text: &str) {
    eprintln!("  {}", paint("diagnostics:".dark_grey()));
    for line in text.lines() {
        eprintln!("    {}", line);
    }
}

pub fn marker(on: bool, label: &str) -> String {
    if on {
        paint_stdout(format!("[{}]", label).green())
    } else {
        String::new()
    }
}

pub fn heading(text: &str) -> String {
    paint_stdout(text.bold())
}
