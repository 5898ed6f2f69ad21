//! Interface de terminal do cloudsolve: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner enquanto uma tarefa roda e
//! `console` para estilização com cores. O [`EventPrinter`] consome os
//! eventos da máquina e os imprime na ordem em que chegam.

use std::time::Duration;

use console::{Style, Term};
use indicatif::{ProgressBar, ProgressStyle};

use cloudsolve::cluster::{JobEntry, JobStatus};
use cloudsolve::events::Event;

/// Renderiza eventos no terminal.
///
/// Mensagens de status vão em texto normal, avisos em amarelo, erros em
/// vermelho e linhas do poller em ciano. Um spinner fica ativo entre
/// `Started` e `Stopped`.
pub struct EventPrinter {
    // Spinner da tarefa em andamento, se houver.
    pb: Option<ProgressBar>,
    green: Style,
    red: Style,
    yellow: Style,
    cyan: Style,
    dim: Style,
}

impl Default for EventPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPrinter {
    pub fn new() -> Self {
        Self {
            pb: None,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            cyan: Style::new().cyan(),
            dim: Style::new().dim(),
        }
    }

    /// Imprime uma linha acima do spinner, ou direto no stdout sem spinner.
    fn line(&self, text: impl AsRef<str>) {
        let text = text.as_ref().trim_end_matches('\n');
        match &self.pb {
            Some(pb) => pb.println(text),
            None => println!("{text}"),
        }
    }

    /// Trata um evento vindo da máquina ou do poller.
    pub fn handle(&mut self, event: &Event) {
        match event {
            Event::Started(task) => {
                let pb = ProgressBar::new_spinner();
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.cyan} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb.set_message(format!("{task}"));
                pb.enable_steady_tick(Duration::from_millis(100));
                self.pb = Some(pb);
            }
            Event::Stopped { task, failed } => {
                if let Some(pb) = self.pb.take() {
                    pb.finish_and_clear();
                }
                if *failed {
                    println!("  {} {task} failed", self.red.apply_to("✗"));
                } else {
                    println!("  {} {task} done", self.green.apply_to("✓"));
                }
            }
            Event::Status(text) => self.line(text),
            Event::Warning(text) => self.line(self.yellow.apply_to(text.trim_end()).to_string()),
            Event::Error(text) => self.line(self.red.apply_to(text.trim_end()).to_string()),
            Event::SolverStatus(text) => self.line(self.cyan.apply_to(text.trim_end()).to_string()),
            Event::JobsFinished(jobs) => self.line(render_jobs(jobs, &self.dim)),
            Event::NeedAuth => self.line(
                self.yellow
                    .apply_to("Run `cloudsolve auth --email <EMAIL>` to log in.")
                    .to_string(),
            ),
            Event::Authenticated(true) => {
                self.line(format!("  {} authenticated", self.green.apply_to("●")))
            }
            Event::Authenticated(false) => {
                self.line(format!("  {} not authenticated", self.red.apply_to("●")))
            }
            Event::Submitted { job_id } => {
                self.line(self.dim.apply_to(format!("Full job id: {job_id}")).to_string())
            }
            Event::ResultsSaved { path, .. } => {
                self.line(format!("  {} {}", self.green.apply_to("→"), path.display()))
            }
        }
    }
}

/// Coluna de status com largura fixa. O preenchimento vem antes da cor,
/// senão os códigos de escape contam na largura.
fn status_label(status: &JobStatus) -> String {
    let padded = format!("{:<10}", status.to_string());
    let style = match status {
        JobStatus::Completed => Style::new().green(),
        JobStatus::Processing => Style::new().cyan(),
        JobStatus::Queued => Style::new().yellow(),
        JobStatus::Other(_) => Style::new(),
    };
    style.apply_to(padded).to_string()
}

/// Formata a lista de jobs como tabela: rótulo, status e id completo.
pub fn render_jobs(jobs: &[JobEntry], dim: &Style) -> String {
    if jobs.is_empty() {
        return dim.apply_to("No jobs.").to_string();
    }
    let width = jobs.iter().map(|j| j.label.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for job in jobs {
        out.push_str(&format!(
            "  {:<width$}  {}  {}\n",
            job.label,
            status_label(&job.status),
            dim.apply_to(&job.job_id),
        ));
    }
    out
}

/// Verdadeiro para as respostas afirmativas aceitas na confirmação.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Pergunta sim/não no terminal. Qualquer coisa além de `y`/`yes` é não.
pub fn confirm(question: &str) -> std::io::Result<bool> {
    let term = Term::stderr();
    term.write_str(&format!("{question} [y/N] "))?;
    let answer = term.read_line()?;
    Ok(is_yes(&answer))
}
