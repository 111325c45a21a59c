//! Report

use std::{fmt::Write, io};

use rusty_money::{Money, iso::Currency};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    catalog::Catalog,
    config::PlannerConfig,
    offers::OfferKey,
    planner::{PlanOutcome, PlanResult},
    solution::{Solution, VendorOrder},
    solvers::TerminationReason,
};

/// Errors that can occur when rendering a report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The plan references an offer the catalog does not hold.
    #[error("Missing offer")]
    MissingOffer(OfferKey),

    /// IO error
    #[error("IO error")]
    IO,
}

/// Printable view of a planning outcome.
#[derive(Debug, Clone, Copy)]
pub struct PlanReport<'r, 'a> {
    catalog: &'r Catalog<'a>,
    outcome: &'r PlanOutcome<'a>,
}

impl<'r, 'a> PlanReport<'r, 'a> {
    /// Create a report for `outcome`, planned over `catalog`.
    pub fn new(catalog: &'r Catalog<'a>, outcome: &'r PlanOutcome<'a>) -> Self {
        Self { catalog, outcome }
    }

    /// Writes the report: one table per vendor order followed by the plan totals.
    ///
    /// # Errors
    ///
    /// Returns an error if an offer is missing from the catalog or the output cannot be written.
    pub fn write_to(
        &self,
        mut out: impl io::Write,
        config: &PlannerConfig,
    ) -> Result<(), ReportError> {
        match &self.outcome.result {
            PlanResult::Solved(solution) => {
                for order in solution.orders() {
                    self.write_order(&mut out, order)?;
                }

                write_plan_summary(&mut out, solution, self.catalog.currency())?;
            }
            PlanResult::Infeasible => write_infeasible(&mut out, config)?,
        }

        self.write_notes(&mut out)
    }

    fn write_order(
        &self,
        out: &mut impl io::Write,
        order: &VendorOrder<'a>,
    ) -> Result<(), ReportError> {
        let mut builder = Builder::default();

        builder.push_record(["Component", "Product", "Qty", "Unit Price", "Price"]);

        for line in order.lines() {
            let offer = self
                .catalog
                .offer(line.offer)
                .ok_or(ReportError::MissingOffer(line.offer))?;

            builder.push_record([
                self.catalog.component_name(line.component).to_string(),
                offer.product().to_string(),
                offer.quantity().to_string(),
                format!("{}", offer.unit_price()),
                format!("{}", offer.total_price()),
            ]);
        }

        let body_rows = order.lines().len() + 1;
        let order_total = Money::from_minor(order.total_minor(), self.catalog.currency());

        builder.push_record([
            "Shipping".to_string(),
            String::new(),
            String::new(),
            String::new(),
            format!("{}", order.shipping()),
        ]);

        builder.push_record([
            "Order total".to_string(),
            String::new(),
            String::new(),
            String::new(),
            format!("{order_total}"),
        ]);

        writeln!(
            out,
            "\n\x1b[1m{}\x1b[0m ({} item{})",
            self.catalog.vendor_name(order.vendor()),
            order.lines().len(),
            if order.lines().len() == 1 { "" } else { "s" }
        )
        .map_err(|_err| ReportError::IO)?;

        write_order_table(out, builder, body_rows)
    }

    fn write_notes(&self, out: &mut impl io::Write) -> Result<(), ReportError> {
        if !self.outcome.excluded_components.is_empty() {
            let names: Vec<&str> = self
                .outcome
                .excluded_components
                .iter()
                .map(|key| self.catalog.component_name(*key))
                .collect();

            writeln!(out, " Not offered by any vendor: {}", names.join(", "))
                .map_err(|_err| ReportError::IO)?;
        }

        match self.outcome.termination {
            TerminationReason::Exhausted => Ok(()),
            TerminationReason::EarlyTermination => {
                writeln!(out, " Search stopped within tolerance of the lower bound.")
                    .map_err(|_err| ReportError::IO)
            }
            TerminationReason::TimeLimit => writeln!(
                out,
                " Search stopped at the time limit; the plan may not be optimal."
            )
            .map_err(|_err| ReportError::IO),
        }
    }
}

fn write_order_table(
    out: &mut impl io::Write,
    builder: Builder,
    body_rows: usize,
) -> Result<(), ReportError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);
    theme.insert_horizontal_line(body_rows, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(2..5), Alignment::right());

    let table_str = colorize_borders(&table.to_string());

    writeln!(out, "{table_str}").map_err(|_err| ReportError::IO)
}

fn write_plan_summary(
    out: &mut impl io::Write,
    solution: &Solution<'_>,
    currency: &'static Currency,
) -> Result<(), ReportError> {
    let products_label = " Products:";
    let shipping_label = " Shipping:";
    let total_label = " \x1b[1mTotal:\x1b[0m";
    let vendors_label = " Vendors:";

    let products_val = format!("{}  ", solution.products_subtotal());
    let shipping_val = format!("{}  ", solution.total_shipping());
    let total_val = format!(
        "{}  ",
        Money::from_minor(solution.total_cost_minor(), currency)
    );
    let vendors_val = format!("{}  ", solution.vendor_count());

    let label_width = [products_label, shipping_label, total_label, vendors_label]
        .iter()
        .map(|label| visible_width(label))
        .max()
        .unwrap_or_default();

    let value_width = [&products_val, &shipping_val, &total_val, &vendors_val]
        .iter()
        .map(|value| value.len())
        .max()
        .unwrap_or_default();

    writeln!(out).map_err(|_err| ReportError::IO)?;

    write_summary_line(out, products_label, &products_val, label_width, value_width)?;
    write_summary_line(out, shipping_label, &shipping_val, label_width, value_width)?;

    write_summary_line(
        out,
        total_label,
        &format!("\x1b[1m{total_val}\x1b[0m"),
        label_width,
        value_width,
    )?;

    write_summary_line(out, vendors_label, &vendors_val, label_width, value_width)?;

    writeln!(out).map_err(|_err| ReportError::IO)
}

fn write_infeasible(out: &mut impl io::Write, config: &PlannerConfig) -> Result<(), ReportError> {
    writeln!(
        out,
        "\n \x1b[1mNo feasible plan\x1b[0m with at most {} vendor(s) and a minimum order of {}.",
        config.max_vendor_combinations,
        config.minimum_order_money()
    )
    .map_err(|_err| ReportError::IO)?;

    writeln!(
        out,
        " Lower the minimum order or allow more vendors per plan.\n"
    )
    .map_err(|_err| ReportError::IO)
}

/// Wraps runs of box-drawing characters (U+2500..U+257F) in ANSI dark-grey escape codes.
fn colorize_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut in_run = false;

    for ch in table.chars() {
        let box_char = ('\u{2500}'..='\u{257F}').contains(&ch);

        if box_char && !in_run {
            _ = out.write_str("\x1b[90m");
            in_run = true;
        } else if !box_char && in_run {
            _ = out.write_str("\x1b[0m");
            in_run = false;
        }

        out.push(ch);
    }

    if in_run {
        _ = out.write_str("\x1b[0m");
    }

    out
}

/// Returns the visible (non-ANSI) width of a string.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}

fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    value: &str,
    label_col_width: usize,
    value_col_width: usize,
) -> Result<(), ReportError> {
    let label_pad = label_col_width.saturating_sub(visible_width(label));
    let value_pad = value_col_width.saturating_sub(visible_width(value));

    writeln!(
        out,
        "{:>label_pad$}{label}  {value_pad}{value}",
        "",
        value_pad = " ".repeat(value_pad)
    )
    .map_err(|_err| ReportError::IO)
}
