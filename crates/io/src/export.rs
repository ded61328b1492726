// Normalized catalog as standard CSV

use std::io::Write;
use std::path::Path;

use inventa_core::ProductRecord;

use crate::error::ExportError;

pub const HEADER: [&str; 6] = ["codigo", "nombre", "modelo", "laboratorio", "precio", "stock"];

/// Write one comma-separated row per product, header first. Fields are
/// quoted only when they need it.
pub fn write_catalog<W: Write>(records: &[ProductRecord], out: W) -> Result<(), ExportError> {
    let mut writer = csv::WriterBuilder::new().from_writer(out);
    writer.write_record(HEADER)?;
    for r in records {
        let price = r.price.to_string();
        let stock = r.stock.to_string();
        writer.write_record([
            r.code.as_str(),
            r.name.as_str(),
            r.presentation.as_str(),
            r.laboratory.as_str(),
            price.as_str(),
            stock.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_catalog(records: &[ProductRecord], path: &Path) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    write_catalog(records, std::io::BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_only_where_needed() {
        let records = vec![ProductRecord {
            code: "123456789".into(),
            name: "Paracetamol 500mg".into(),
            presentation: "Caja x10, blister".into(),
            laboratory: "ACME Labs".into(),
            category: None,
            price: 0.0,
            stock: 1,
        }];
        let mut out = Vec::new();
        write_catalog(&records, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "codigo,nombre,modelo,laboratorio,precio,stock\n\
             123456789,Paracetamol 500mg,\"Caja x10, blister\",ACME Labs,0,1\n"
        );
    }
}
