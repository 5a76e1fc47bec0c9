use crate::error::{PnlError, Result};
use crate::schema::{FinancialReport, Section};

impl FinancialReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// One row per account followed by the section totals and profit lines.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["Section", "Code", "Account", "Category", "Value"])?;

        for (section, result) in self.sections.iter() {
            for account in &result.accounts {
                writer.write_record([
                    section.label(),
                    account.code.as_deref().unwrap_or(""),
                    account.name.as_str(),
                    account.category.map(|c| c.label()).unwrap_or(""),
                    format_amount(account.value).as_str(),
                ])?;
            }
        }

        for (section, result) in self.sections.iter() {
            writer.write_record([
                section.label(),
                "",
                format!("Total {}", section.label()).as_str(),
                "",
                format_amount(result.total).as_str(),
            ])?;
        }
        for (line, value) in [
            (Section::GrossProfit, self.gross_profit()),
            (Section::NetProfit, self.net_profit()),
        ] {
            writer.write_record([
                line.label(),
                "",
                line.label(),
                "",
                format_amount(value).as_str(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| PnlError::IoError(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("# {}\n\n", self.company_name));
        output.push_str(&format!(
            "**Period:** {}  \n**Basis:** {:?}  \n**Report type:** {:?}  \n**Currency:** {}\n\n",
            self.period, self.basis_type, self.report_type, self.metadata.currency
        ));

        output.push_str("| Line | Amount | Source |\n|---|---:|---|\n");
        for (section, result) in self.sections.iter() {
            output.push_str(&format!(
                "| {} | {} | {:?} |\n",
                section,
                format_amount(result.total),
                result.total_source
            ));
        }
        output.push_str(&format!(
            "| Gross Profit | {} | {:?} |\n",
            format_amount(self.gross_profit()),
            self.profit_sources.gross_profit
        ));
        output.push_str(&format!(
            "| Net Profit | {} | {:?} |\n\n",
            format_amount(self.net_profit()),
            self.profit_sources.net_profit
        ));

        for (section, result) in self.sections.iter() {
            output.push_str(&format!("## {}\n\n", section));
            if result.accounts.is_empty() {
                output.push_str("_No accounts._\n\n");
                continue;
            }
            output.push_str("| Code | Account | Category | Amount |\n|---|---|---|---:|\n");
            for account in &result.accounts {
                output.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    account.code.as_deref().unwrap_or(""),
                    account.name,
                    account.category.map(|c| c.label()).unwrap_or(""),
                    format_amount(account.value)
                ));
            }
            output.push('\n');
        }

        if !self.warnings.is_empty() {
            output.push_str("## Warnings\n\n");
            for warning in &self.warnings {
                output.push_str(&format!("- {}\n", warning));
            }
        }

        output
    }
}

fn format_amount(value: f64) -> String {
    format!("{:.2}", value)
}
