//! `dynjava repl`: a line-oriented loop over [`Interpreter`].

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use dj_classpath::ClasspathEntry;
use dj_core::{LineIndex, Options};
use dj_interp::{InterpretError, Interpreter};

pub struct Settings {
    pub options: Options,
    pub classpath: Vec<ClasspathEntry>,
    pub max_depth: usize,
    pub stack_mib: usize,
}

pub fn run(settings: Settings) -> Result<()> {
    let stack_mib = settings.stack_mib;
    crate::on_large_stack("dynjava-repl", stack_mib, move || session(settings))
}

fn session(settings: Settings) -> Result<()> {
    let env = crate::library(&settings.classpath)?;
    let mut interp = Interpreter::new(env, settings.options);
    interp.set_max_depth(settings.max_depth);

    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    let mut buffer = String::new();
    let mut blank_lines = 0;
    prompt(interactive, &buffer)?;
    for line in stdin.lock().lines() {
        let line = line.context("reading stdin")?;
        if buffer.is_empty() {
            if let Some(command) = line.trim().strip_prefix(':') {
                match command {
                    "quit" | "q" => return Ok(()),
                    "vars" => print_vars(&mut interp),
                    other => eprintln!("unknown command :{other} (try :vars or :quit)"),
                }
                prompt(interactive, &buffer)?;
                continue;
            }
        }
        if line.trim().is_empty() {
            if !buffer.is_empty() {
                blank_lines += 1;
                if blank_lines >= 2 {
                    submit(&mut interp, &mut buffer, true);
                    blank_lines = 0;
                }
            }
            prompt(interactive, &buffer)?;
            continue;
        }
        blank_lines = 0;
        buffer.push_str(&line);
        buffer.push('\n');
        submit(&mut interp, &mut buffer, false);
        prompt(interactive, &buffer)?;
    }
    if !buffer.trim().is_empty() {
        submit(&mut interp, &mut buffer, true);
    }
    Ok(())
}

fn prompt(interactive: bool, buffer: &str) -> Result<()> {
    if interactive {
        let mut out = io::stdout();
        write!(out, "{}", if buffer.is_empty() { "> " } else { "| " })?;
        out.flush()?;
    }
    Ok(())
}

/// Evaluates the buffered entry. Input that may still be completed stays buffered unless
/// `force` is set.
fn submit(interp: &mut Interpreter, buffer: &mut String, force: bool) {
    match interp.interpret(buffer) {
        Err(err) if err.is_incomplete() && !force => return,
        Ok(Some(value)) => {
            let text = interp.display(&value);
            println!("{text}");
        }
        Ok(None) => {}
        Err(err) => report(&err, buffer),
    }
    let _ = io::stdout().flush();
    buffer.clear();
}

fn report(err: &InterpretError, source: &str) {
    let lines = LineIndex::new(source);
    match err {
        InterpretError::Parse(err) => {
            let at = lines.line_col(err.span.start);
            eprintln!("{}:{}: [{}] {}", at.line, at.col, err.key(), err.message);
        }
        InterpretError::Check(errors) => {
            for err in &errors.errors {
                let at = lines.line_col(err.span.start);
                eprintln!("{}:{}: [{}] {}", at.line, at.col, err.key(), err.message);
            }
        }
        InterpretError::Execution(err) => {
            let at = lines.line_col(err.span.start);
            eprintln!("{}:{}: [{}] {}", at.line, at.col, err.key(), err.message);
        }
        InterpretError::Thrown(thrown) => eprintln!("{}", thrown.report()),
    }
}

fn print_vars(interp: &mut Interpreter) {
    for (name, ty, value) in interp.variables() {
        let shown = match value {
            Some(value) => interp.display(&value),
            None => "<unassigned>".to_string(),
        };
        println!("{ty} {name} = {shown}");
    }
}
