//! Interface de terminal do retrylab — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`QueueProgress`] acompanha visualmente o
//! esvaziamento da fila no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::store::{Job, JobStatus};

/// Indicador visual do progresso da fila no terminal.
///
/// Exibe um spinner animado enquanto o pool processa e uma tabela final
/// com sucesso em verde, falha em vermelho e demais estados em amarelo.
pub struct QueueProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para jobs com sucesso.
    green: Style,
    // Estilo vermelho para jobs com falha.
    red: Style,
    // Estilo amarelo para jobs ainda em andamento.
    yellow: Style,
}

impl QueueProgress {
    /// Inicia o spinner para `total` jobs e retorna a instância de progresso.
    pub fn start(total: usize) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("0/{total} jobs em estado terminal"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a contagem de jobs que já atingiram um estado terminal.
    pub fn update(&self, terminal: usize, total: usize) {
        self.pb
            .set_message(format!("{terminal}/{total} jobs em estado terminal"));
    }

    /// Finaliza o spinner e imprime a tabela de jobs com o resultado final.
    pub fn finish(&self, jobs: &[Job]) {
        self.pb.finish_and_clear();

        println!();
        println!(
            "  {:<10} {:<16} {:<11} {:>9}  {}",
            "id", "type", "status", "attempts", "last_error"
        );
        for job in jobs {
            let style = self.style_for(job.status);
            let short_id = job.id.get(..8).unwrap_or(&job.id);
            println!(
                "  {:<10} {:<16} {:<11} {:>5}/{:<3}  {}",
                short_id,
                job.job_type,
                style.apply_to(job.status),
                job.attempts,
                job.max_attempts,
                job.last_error.as_deref().unwrap_or("-")
            );
        }

        let succeeded = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Succeeded)
            .count();
        let failed = jobs.iter().filter(|j| j.status == JobStatus::Failed).count();
        println!();
        println!(
            "  {} {succeeded} succeeded, {} {failed} failed",
            self.green.apply_to("✓"),
            self.red.apply_to("✗")
        );
    }

    // Mapeia o status do job para o estilo de cor correspondente.
    fn style_for(&self, status: JobStatus) -> &Style {
        match status {
            JobStatus::Succeeded => &self.green,
            JobStatus::Failed => &self.red,
            _ => &self.yellow,
        }
    }
}
