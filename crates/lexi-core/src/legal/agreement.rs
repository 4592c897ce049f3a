use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use serde::Deserialize;

use crate::error::DraftError;

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN_MM: f32 = 20.0;
const LINE_MM: f32 = 8.0;
/// Roughly what fits in 170mm of 12pt Helvetica.
const WRAP_CHARS: usize = 85;

/// Form fields of the rental agreement generator. Missing or blank fields
/// fall back to placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RentalAgreement {
    pub agreement_date: Option<String>,
    pub landlord_name: Option<String>,
    pub tenant_name: Option<String>,
    pub property_address: Option<String>,
    pub term_months: Option<String>,
    pub rent_amount: Option<String>,
    pub deposit_amount: Option<String>,
    pub additional_clauses: Option<String>,
}

fn field<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).unwrap_or(fallback)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Body,
    Bold,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Text(Style, String),
    Gap(u8),
}

impl RentalAgreement {
    fn blocks(&self) -> Vec<Block> {
        use Block::{Gap, Text};
        use Style::{Body, Bold, Title};

        let landlord = field(&self.landlord_name, "[Landlord Name]");
        let tenant = field(&self.tenant_name, "[Tenant Name]");
        let mut blocks = vec![
            Text(Title, "RENTAL AGREEMENT".to_owned()),
            Gap(1),
            Text(Body, format!(
                "This Rental Agreement is made on this day, {},",
                field(&self.agreement_date, "_________")
            )),
            Text(Body, format!("BETWEEN: {landlord} (hereinafter referred to as the \"LANDLORD\").")),
            Text(Body, format!("AND: {tenant} (hereinafter referred to as the \"TENANT\").")),
            Gap(1),
            Text(Body, format!(
                "The landlord agrees to rent to the tenant the property located at: {}.",
                field(&self.property_address, "[Property Address]")
            )),
            Gap(1),
            Text(Bold, format!(
                "1. TERM: The term of this lease shall be for {} months.",
                field(&self.term_months, "11")
            )),
            Text(Bold, format!("2. RENT: The monthly rent shall be Rs. {}/-.", field(&self.rent_amount, "0"))),
            Text(Bold, format!(
                "3. DEPOSIT: The tenant has paid a security deposit of Rs. {}/-.",
                field(&self.deposit_amount, "0")
            )),
        ];
        let extra = field(&self.additional_clauses, "");
        if !extra.is_empty() {
            blocks.push(Gap(1));
            blocks.push(Text(Body, extra.to_owned()));
        }
        blocks.extend([
            Gap(2),
            Text(Body, "IN WITNESS WHEREOF, the parties have executed this agreement.".to_owned()),
            Gap(2),
            Text(Body, "_________________________".to_owned()),
            Text(Body, format!("LANDLORD ({})", field(&self.landlord_name, ""))),
            Gap(2),
            Text(Body, "_________________________".to_owned()),
            Text(Body, format!("TENANT ({})", field(&self.tenant_name, ""))),
        ]);
        blocks
    }

    /// Render the agreement as an A4 PDF.
    pub fn render_pdf(&self) -> Result<Vec<u8>, DraftError> {
        let (doc, page, layer) = PdfDocument::new("Rental Agreement", PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
        let regular = builtin_font(&doc, BuiltinFont::Helvetica)?;
        let bold = builtin_font(&doc, BuiltinFont::HelveticaBold)?;

        let mut cursor = Cursor { layer: doc.get_page(page).get_layer(layer), y: PAGE_HEIGHT.0 - MARGIN_MM };
        for block in self.blocks() {
            match block {
                Block::Gap(n) => cursor.y -= LINE_MM * f32::from(n),
                Block::Text(style, text) => {
                    let (font, size) = match style {
                        Style::Title => (&bold, 16.0),
                        Style::Bold => (&bold, 12.0),
                        Style::Body => (&regular, 12.0),
                    };
                    for line in wrap(&text, WRAP_CHARS) {
                        cursor.ensure_room(&doc);
                        let x = if style == Style::Title { PAGE_WIDTH.0 / 2.0 - 25.0 } else { MARGIN_MM };
                        cursor.layer.use_text(line, size, Mm(x), Mm(cursor.y), font);
                        cursor.y -= LINE_MM;
                    }
                }
            }
        }

        drop(cursor);
        doc.save_to_bytes().map_err(|e| DraftError::Render(e.to_string()))
    }
}

struct Cursor {
    layer: PdfLayerReference,
    y: f32,
}

impl Cursor {
    fn ensure_room(&mut self, doc: &PdfDocumentReference) {
        if self.y < MARGIN_MM {
            let (page, layer) = doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Layer 1");
            self.layer = doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT.0 - MARGIN_MM;
        }
    }
}

fn builtin_font(doc: &PdfDocumentReference, font: BuiltinFont) -> Result<IndirectFontRef, DraftError> {
    doc.add_builtin_font(font).map_err(|e| DraftError::Render(e.to_string()))
}

/// Greedy word wrap on character count; explicit newlines are kept.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let needed = if line.is_empty() { word.chars().count() } else { line.chars().count() + 1 + word.chars().count() };
            if needed > width && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn blank_fields_use_placeholders() {
        let agreement = RentalAgreement { landlord_name: Some("  ".into()), ..Default::default() };
        let text: Vec<String> = agreement
            .blocks()
            .into_iter()
            .filter_map(|b| match b {
                Block::Text(_, t) => Some(t),
                Block::Gap(_) => None,
            })
            .collect();
        assert!(text.iter().any(|t| t.starts_with("BETWEEN: [Landlord Name]")));
        assert!(text.iter().any(|t| t.contains("for 11 months")));
        assert!(text.iter().any(|t| t == "LANDLORD ()"));
    }

    #[test]
    fn additional_clauses_are_included_only_when_present() {
        let base = RentalAgreement::default().blocks().len();
        let with_extra = RentalAgreement {
            additional_clauses: Some("4. No subletting.".into()),
            ..Default::default()
        };
        assert_eq!(with_extra.blocks().len(), base + 2);
    }

    #[test]
    fn wrap_breaks_on_words() {
        let lines = wrap("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
        assert_eq!(wrap("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn renders_a_pdf() {
        let agreement = RentalAgreement {
            agreement_date: Some("1 April 2024".into()),
            landlord_name: Some("R. Mehta".into()),
            tenant_name: Some("A. Rao".into()),
            property_address: Some("12 MG Road, Bengaluru".into()),
            term_months: Some("11".into()),
            rent_amount: Some("25000".into()),
            deposit_amount: Some("50000".into()),
            additional_clauses: Some("4. Pets allowed. ".repeat(80)),
        };
        let bytes = agreement.render_pdf().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
