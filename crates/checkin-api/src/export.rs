use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
};
use rust_xlsxwriter::{Format, Workbook};
use tracing::info;

use checkin_db::models::CheckinRow;
use checkin_types::api::ExportQuery;

use crate::error::{ApiError, run_blocking};
use crate::history::{DEFAULT_RANGE, range_start};
use crate::state::AppState;

const HEADERS: [&str; 10] = [
    "ID", "用戶ID", "姓名", "日期", "時間", "類型", "位置", "備註", "緯度", "經度",
];

const SHEET_NAME: &str = "打卡記錄";

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    fn parse(s: Option<&str>) -> Result<Self, ApiError> {
        match s.map(str::trim) {
            None | Some("") | Some("xlsx") | Some("excel") => Ok(Self::Xlsx),
            Some("csv") => Ok(Self::Csv),
            Some(other) => Err(ApiError::BadRequest(format!("不支援的匯出格式: {other}"))),
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            Self::Csv => "text/csv; charset=utf-8",
            Self::Xlsx => XLSX_CONTENT_TYPE,
        }
    }
}

fn cells(row: &CheckinRow) -> [String; 10] {
    let opt_num = |v: Option<f64>| v.map(|n| n.to_string()).unwrap_or_default();
    [
        row.id.to_string(),
        row.user_id.clone(),
        row.name.clone(),
        row.date.clone(),
        row.time.clone(),
        row.checkin_type.to_string(),
        row.location.clone().unwrap_or_default(),
        row.note.clone().unwrap_or_default(),
        opt_num(row.latitude),
        opt_num(row.longitude),
    ]
}

/// CSV with a UTF-8 BOM so spreadsheet apps pick the right encoding.
pub fn to_csv(rows: &[CheckinRow]) -> Result<Vec<u8>> {
    let mut buf = "\u{feff}".as_bytes().to_vec();
    {
        let mut wtr = csv::Writer::from_writer(&mut buf);
        wtr.write_record(HEADERS)?;
        for row in rows {
            wtr.write_record(cells(row))?;
        }
        wtr.flush()?;
    }
    Ok(buf)
}

pub fn to_xlsx(rows: &[CheckinRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();
    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count() * 2).collect();
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        worksheet.write_number(r, 0, row.id as f64)?;
        for (col, value) in cells(row).iter().enumerate().skip(1) {
            match (col, row.latitude, row.longitude) {
                (8, Some(lat), _) => worksheet.write_number(r, col as u16, lat)?,
                (9, _, Some(lng)) => worksheet.write_number(r, col as u16, lng)?,
                _ => worksheet.write_string(r, col as u16, value)?,
            };
            widths[col] = widths[col].max(value.chars().count() + 2);
        }
    }
    for (col, width) in widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width as f64)?;
    }

    workbook.save_to_buffer().context("failed to build workbook")
}

pub async fn checkin_records(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let format = ExportFormat::parse(query.format.as_deref())?;
    let user_id = query.user_id.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
    let now = state.config.now();
    let range = query.date_range.unwrap_or_else(|| DEFAULT_RANGE.into());
    let from = range_start(&range, now.date())?;
    let to = Some(now.date());

    let st = state.clone();
    let (count, bytes) = run_blocking(move || -> Result<_> {
        let rows = st.db.query_records(user_id.as_deref(), from, to)?;
        let bytes = match format {
            _ if rows.is_empty() => Vec::new(),
            ExportFormat::Csv => to_csv(&rows)?,
            ExportFormat::Xlsx => to_xlsx(&rows)?,
        };
        Ok((rows.len(), bytes))
    })
    .await?;

    if count == 0 {
        return Err(ApiError::NotFound("沒有找到符合條件的打卡記錄".into()));
    }
    info!("Exported {} check-in records as {}", count, format.extension());

    let filename = format!(
        "checkin_records_{}.{}",
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    );
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkin_types::models::CheckinType;

    fn row(id: i64, note: Option<&str>) -> CheckinRow {
        CheckinRow {
            id,
            user_id: "U1".into(),
            name: "小明".into(),
            date: "2024-03-04".into(),
            time: "09:00:00".into(),
            checkin_type: CheckinType::ClockIn,
            location: Some("台北, 信義區".into()),
            note: note.map(String::from),
            latitude: Some(25.033),
            longitude: None,
            created_at: String::new(),
        }
    }

    #[test]
    fn csv_has_bom_header_and_quoted_fields() {
        let bytes = to_csv(&[row(1, Some("早到"))]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), "\u{feff}ID,用戶ID,姓名,日期,時間,類型,位置,備註,緯度,經度");
        assert_eq!(
            lines.next().unwrap(),
            "1,U1,小明,2024-03-04,09:00:00,上班,\"台北, 信義區\",早到,25.033,"
        );
    }

    #[test]
    fn xlsx_is_a_zip_container() {
        let bytes = to_xlsx(&[row(1, None), row(2, Some("備註"))]).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn format_parsing() {
        assert_eq!(ExportFormat::parse(None).unwrap(), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::parse(Some("csv")).unwrap(), ExportFormat::Csv);
        assert!(ExportFormat::parse(Some("pdf")).is_err());
    }
}
