use std::process;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use miniscm::reader::{ReadOutcome, SyntaxReader};
use miniscm::repl::{Outcome, Session};

fn main() {
    if let Err(err) = run() {
        eprintln!("miniscm: {err}");
        process::exit(1);
    }
}

/// Line-reading loop around the session core. rustyline shows the prompt
/// on interactive terminals and reads piped input silently, so scripted
/// runs see only the evaluation output.
fn run() -> rustyline::Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut reader = SyntaxReader::new();
    let mut session = Session::new();

    'repl: loop {
        loop {
            match reader.read() {
                Ok(ReadOutcome::Item(stx)) => match session.handle(&stx) {
                    Outcome::Print(line) => println!("{line}"),
                    Outcome::Quiet => {}
                    Outcome::Stop => break 'repl,
                },
                Ok(ReadOutcome::NeedMore) => break,
                Ok(ReadOutcome::Done) => break 'repl,
                Err(_) => println!("RuntimeError"),
            }
        }
        match editor.readline("scm> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                reader.push_line(&line);
            }
            Err(ReadlineError::Eof) => reader.finish(),
            Err(ReadlineError::Interrupted) => break,
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
