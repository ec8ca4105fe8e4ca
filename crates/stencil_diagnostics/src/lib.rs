pub mod diagnostic_report;
pub mod message;

use colored::*;
use diagnostic_report::{Diagnostic, Severity};
use stencil_type::file::SourceMap;

pub fn render(
  diag: &Diagnostic,
  sm: &SourceMap,
) {
  print_header(diag);
  print_location(diag, sm);

  for label in &diag.labels {
    let (line, col) = sm.line_col(&label.span.file, label.span.start);
    println!("  {} {} ({}:{})", "label:".yellow().bold(), label.message, line, col);
  }

  for note in &diag.notes {
    println!("  {} {}", "note:".cyan().bold(), note);
  }

  println!();
}

pub fn render_batch(
  diagnostics: &[Diagnostic],
  sm: &SourceMap,
) {
  for diag in diagnostics {
    render(diag, sm);
  }
}

fn print_header(diag: &Diagnostic) {
  let message = diag.message.bold();
  let code = diag.error_code.bold();

  match diag.severity {
    Severity::Info => {
      println!("{}[{}]: {}", "Info".blue().bold(), code.blue(), message)
    },
    Severity::Warning => {
      println!("{}[{}]: {}", "Warning".yellow().bold(), code.yellow(), message)
    },
    Severity::Error => {
      println!("{}[{}]: {}", "Error".red().bold(), code.red().bold(), message)
    },
    Severity::Hint => {
      println!("{}[{}]: {}", "Hint".cyan().bold(), code.cyan(), message)
    },
  }
}

fn print_location(
  diag: &Diagnostic,
  sm: &SourceMap,
) {
  let span = &diag.primary_span;
  let Some(file) = sm.get(&span.file) else {
    println!("{:2}{} {}", "", "-->".blue().bold(), "<synthetic>".dimmed());
    return;
  };

  let (line, col) = sm.line_col(&span.file, span.start);
  println!(
    "{:2}{} {}:{}:{}",
    "",
    "-->".blue().bold(),
    file.path.display().to_string().bold(),
    line.to_string().bold(),
    col.to_string().bold(),
  );

  let pipe = "|".blue().bold();
  let Some(text) = file.text.lines().nth((line as usize).saturating_sub(1)) else {
    return;
  };

  println!("{:3}{:3}", "", pipe);
  println!("{:3}{:3}{}", line.to_string().blue().bold(), pipe, text);

  let caret = "^".repeat(span.len().max(1)).red().bold();
  println!("{:3}{:3}{}{}", "", pipe, " ".repeat(col.saturating_sub(1) as usize), caret);
}

#[cfg(test)]
mod tests {
  use stencil_type::{BytePosition, span::Span};

  use super::*;
  use crate::message::InternalError;

  #[test]
  fn renders_located_and_synthetic_diagnostics() {
    let mut sm = SourceMap::new();
    let file = sm.add_file("pair.src", "type Pair[T any] struct {\n  a, b T\n}\n".to_string());
    let span = Span::new(file, BytePosition(29), BytePosition(33));
    assert_eq!(sm.line_col(&file, span.start), (2, 4));

    let located = InternalError::MissingSubDictionary {
      decl: "Swap".to_string(),
      node: 4,
      span: span.clone(),
    }
    .report()
    .with_label(span, "needed here".to_string());
    let synthetic = InternalError::MissingBody {
      decl: "Identity".to_string(),
      span: Span::synthetic(),
    }
    .report();

    render_batch(&[located, synthetic], &sm);
  }
}
