use super::ui;
use crate::core::{CollateralEngine, InputEvent, LoanForm, ReactiveController, Recomputation};
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Reads `field=value` lines and re-renders the valuation once input has
/// been quiet for `delay`.
pub async fn run<R>(
    engine: Arc<CollateralEngine>,
    delay: Duration,
    initial: LoanForm,
    input: R,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    eprintln!(
        "{}",
        ui::style_text(
            "Enter field=value lines (date, currency, amount, rate, months). Ctrl-D to quit.",
            ui::StyleType::Subtle
        )
    );
    watch(engine, delay, initial, input, std::io::stdout()).await?;
    Ok(())
}

/// Drives the controller from `input` and renders every delivered
/// recomputation into `out`, which is handed back once input is exhausted.
async fn watch<R, W>(
    engine: Arc<CollateralEngine>,
    delay: Duration,
    initial: LoanForm,
    input: R,
    mut out: W,
) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send + 'static,
{
    info!(?delay, "Watching for input changes");

    let (tx, mut rx) = mpsc::unbounded_channel::<Recomputation>();
    let printer = tokio::spawn(async move {
        while let Some(recomputation) = rx.recv().await {
            render(&mut out, &recomputation).context("Failed to write result")?;
        }
        anyhow::Ok(out)
    });

    let mut controller = ReactiveController::new(engine, delay, tx).with_form(initial);
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.parse::<InputEvent>() {
            Ok(event) => controller.handle(event),
            Err(e) => eprintln!("{}", ui::style_text(&e.to_string(), ui::StyleType::Error)),
        }
    }

    debug!("Input closed, waiting for the last recomputation");
    controller.settle().await;
    drop(controller);
    printer.await.context("Result printer failed")?
}

/// A failed run replaces the previous result with the error.
fn render<W: Write>(out: &mut W, recomputation: &Recomputation) -> std::io::Result<()> {
    writeln!(out, "\n{}", ui::separator())?;
    match &recomputation.outcome {
        Ok(valuation) => writeln!(out, "{}", valuation.display_as_table())?,
        Err(e) => writeln!(
            out,
            "{} {}",
            ui::style_text("No result:", ui::StyleType::TotalLabel),
            ui::style_text(&e.to_string(), ui::StyleType::Error)
        )?,
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CurrencyConverter, ExchangeRateTable, PriceResolver, PriceTable};
    use chrono::NaiveDate;
    use tokio::io::{AsyncWriteExt, BufReader};
    use tokio::time::sleep;

    const WORTH_IT_LABEL: &str = "Was the loan worth it?";

    fn engine() -> Arc<CollateralEngine> {
        let table = PriceTable::from_iter([
            (NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(), 30000.0),
            (NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(), 60000.0),
        ]);
        Arc::new(CollateralEngine::new(
            PriceResolver::new(Arc::new(table), None),
            CurrencyConverter::new(Arc::new(ExchangeRateTable::fallback())),
        ))
    }

    fn plain(out: Vec<u8>) -> String {
        console::strip_ansi_codes(&String::from_utf8(out).unwrap()).to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_lines_renders_one_result() {
        let input =
            "date=2021-01-01\ncurrency=EUR\n# comment\namount=5000\nbogus\nrate=7\nmonths=12\n";
        let out = watch(
            engine(),
            Duration::from_secs(2),
            LoanForm::default(),
            input.as_bytes(),
            Vec::new(),
        )
        .await
        .unwrap();

        let output = plain(out);
        assert_eq!(output.matches(WORTH_IT_LABEL).count(), 1);
        assert!(output.contains("Yes"));
        assert!(!output.contains("No result:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_recomputation_replaces_previous_result() {
        let (reader, mut writer) = tokio::io::duplex(1024);
        let feeder = tokio::spawn(async move {
            writer
                .write_all(b"date=2021-01-01\namount=5000\nrate=7\nmonths=12\n")
                .await
                .unwrap();
            sleep(Duration::from_secs(5)).await;
            writer.write_all(b"date=2019-01-01\n").await.unwrap();
            sleep(Duration::from_secs(5)).await;
        });

        let out = watch(
            engine(),
            Duration::from_secs(2),
            LoanForm::default(),
            BufReader::new(reader),
            Vec::new(),
        )
        .await
        .unwrap();
        feeder.await.unwrap();

        let output = plain(out);
        let table_at = output.find(WORTH_IT_LABEL).unwrap();
        let error_at = output.find("No result:").unwrap();
        assert!(table_at < error_at);
        assert_eq!(output.matches(WORTH_IT_LABEL).count(), 1);
        assert!(output.contains("No price data available for 2019-01-01"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_without_changes_renders_nothing() {
        let out = watch(
            engine(),
            Duration::from_secs(2),
            LoanForm::default(),
            "# nothing\n\n".as_bytes(),
            Vec::new(),
        )
        .await
        .unwrap();
        assert!(out.is_empty());
    }
}
