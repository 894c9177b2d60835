use super::ui;
use crate::core::{CollateralEngine, LoanForm, Valuation};
use anyhow::{Context, Result};
use comfy_table::Cell;
use tracing::info;

impl Valuation {
    pub fn display_as_table(&self) -> String {
        let r = &self.result;
        let currency = r.currency.code();

        let mut table = ui::new_styled_table();
        table.set_header(vec![ui::header_cell("Item"), ui::header_cell("Value")]);

        table.add_row(vec![
            ui::label_cell("Start Date"),
            Cell::new(format!("{} ({})", r.start_date, self.start_source)),
        ]);
        table.add_row(vec![
            ui::label_cell("End Date"),
            Cell::new(format!("{} ({})", r.end_date, self.end_source)),
        ]);
        table.add_row(vec![
            ui::label_cell("BTC Price at Start"),
            ui::amount_cell(r.start_price_usd, "USD"),
        ]);
        table.add_row(vec![
            ui::label_cell("BTC Price at End"),
            ui::amount_cell(r.end_price_usd, "USD"),
        ]);
        table.add_row(vec![
            ui::label_cell("Loan Amount"),
            ui::amount_cell(r.loan_amount, currency),
        ]);
        table.add_row(vec![
            ui::label_cell("Total Amount Due"),
            ui::amount_cell(r.total_amount_due, currency),
        ]);
        table.add_row(vec![
            ui::label_cell("Collateral"),
            Cell::new(format!("{:.8} BTC", r.collateral_btc)),
        ]);
        table.add_row(vec![
            ui::label_cell("Collateral Value at Start"),
            ui::amount_cell(r.collateral_value_at_start, currency),
        ]);
        table.add_row(vec![
            ui::label_cell("Collateral Value at End"),
            ui::amount_cell(r.collateral_value_at_end, currency),
        ]);
        table.add_row(vec![
            ui::label_cell("Appreciation"),
            ui::signed_amount_cell(r.appreciation, currency),
        ]);
        table.add_row(vec![
            ui::label_cell("Annualized BTC Change"),
            r.annualized_appreciation_percent
                .map_or_else(ui::na_cell, ui::change_cell),
        ]);
        table.add_row(vec![
            ui::label_cell("Interest Paid"),
            ui::amount_cell(r.interest_paid, currency),
        ]);
        table.add_row(vec![
            ui::label_cell("Net Result"),
            ui::signed_amount_cell(r.net_result, currency),
        ]);

        let verdict = if r.was_worth_it {
            ui::style_text("Yes", ui::StyleType::Positive)
        } else {
            ui::style_text("No", ui::StyleType::Error)
        };

        format!(
            "{}\n\n{}: {}",
            table,
            ui::style_text("Was the loan worth it?", ui::StyleType::TotalLabel),
            verdict
        )
    }
}

/// One-shot evaluation of a fully specified loan.
pub async fn run(engine: &CollateralEngine, form: LoanForm, json: bool) -> Result<()> {
    let request = form.to_request()?;
    info!(?request, "Evaluating loan");

    let pb = ui::new_spinner("Resolving BTC prices...");
    let valuation = engine.evaluate(&request).await;
    pb.finish_and_clear();
    let valuation = valuation?;

    if json {
        let output = serde_json::to_string_pretty(&valuation.result)
            .context("Failed to serialize result")?;
        println!("{output}");
    } else {
        println!("{}", valuation.display_as_table());
    }
    Ok(())
}
