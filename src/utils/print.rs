//! Printable HTML pages. Every interpolated value goes through [`escape`].

use crate::domain::attendance_window::TimesheetSummary;
use crate::domain::leave_rules::LeaveType;
use crate::model::attendance::Attendance;
use crate::model::leave_request::LeaveRequest;
use qrcode::render::svg;
use qrcode::types::QrError;
use qrcode::QrCode;
use std::fmt::Write;
use std::str::FromStr;

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Who the page is about, printed under the center name.
pub struct Letterhead<'a> {
    pub center: &'a str,
    pub employee_name: &'a str,
    pub employee_code: &'a str,
    pub department: Option<&'a str>,
}

fn minutes(total: i64) -> String {
    format!("{}:{:02}", total / 60, total % 60)
}

fn status_label(status: Option<&str>) -> &'static str {
    match status {
        Some("on_time") => "في الموعد",
        Some("late") => "متأخر",
        Some("early_leave") => "انصراف مبكر",
        Some("complete") => "مكتمل",
        _ => "-",
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="ar" dir="rtl">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: Tahoma, Arial, sans-serif; margin: 24px; }}
h1, h2 {{ text-align: center; margin: 4px 0; }}
table {{ width: 100%; border-collapse: collapse; margin-top: 16px; }}
th, td {{ border: 1px solid #444; padding: 6px; text-align: center; }}
.meta td {{ border: none; text-align: right; }}
.signatures {{ margin-top: 48px; display: flex; justify-content: space-between; }}
.badge {{ width: 320px; margin: 0 auto; border: 2px solid #444; border-radius: 8px; padding: 12px; text-align: center; }}
.badge svg {{ width: 180px; height: 180px; }}
@media print {{ body {{ margin: 0; }} }}
</style>
</head>
<body onload="window.print()">
{body}
</body>
</html>
"#,
        title = escape(title),
        body = body
    )
}

fn header(out: &mut String, head: &Letterhead<'_>, title: &str) {
    let _ = write!(
        out,
        r#"<h1>{}</h1>
<h2>{}</h2>
<table class="meta">
<tr><td>الاسم: {}</td><td>الكود: {}</td><td>القسم: {}</td></tr>
</table>
"#,
        escape(head.center),
        escape(title),
        escape(head.employee_name),
        escape(head.employee_code),
        escape(head.department.unwrap_or("-")),
    );
}

pub fn render_timesheet(
    head: &Letterhead<'_>,
    month: &str,
    records: &[Attendance],
    summary: &TimesheetSummary,
) -> String {
    let title = format!("كشف الحضور والانصراف - {month}");
    let mut body = String::new();
    header(&mut body, head, &title);

    body.push_str(
        "<table>\n<tr><th>التاريخ</th><th>الحضور</th><th>الحالة</th><th>الانصراف</th>\
         <th>الحالة</th><th>دقائق التأخير</th><th>ساعات العمل</th><th>ملاحظات</th></tr>\n",
    );
    for r in records {
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            r.date,
            r.check_in.map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "-".into()),
            status_label(r.check_in_status.as_deref()),
            r.check_out.map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "-".into()),
            status_label(r.check_out_status.as_deref()),
            r.late_minutes,
            minutes(r.worked_minutes as i64),
            escape(r.notes.as_deref().unwrap_or("")),
        );
    }
    body.push_str("</table>\n");

    let _ = write!(
        body,
        r#"<table>
<tr><th>أيام الحضور</th><th>أيام التأخير</th><th>إجمالي التأخير</th><th>انصراف مبكر</th><th>بدون انصراف</th><th>إجمالي ساعات العمل</th></tr>
<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>
</table>
<div class="signatures"><span>توقيع الموظف</span><span>شؤون العاملين</span><span>المدير</span></div>
"#,
        summary.days_present,
        summary.late_days,
        minutes(summary.total_late_minutes),
        summary.early_leaves,
        summary.missing_check_outs,
        minutes(summary.worked_minutes),
    );

    page(&title, &body)
}

pub fn render_leave_form(head: &Letterhead<'_>, leave: &LeaveRequest) -> String {
    let title = "طلب إجازة";
    let mut body = String::new();
    header(&mut body, head, title);

    let leave_type = LeaveType::from_str(&leave.leave_type)
        .map(LeaveType::arabic_label)
        .unwrap_or("-");
    let status = match leave.status.as_str() {
        "pending" => "قيد المراجعة",
        "approved" => "موافق عليها",
        "rejected" => "مرفوضة",
        "cancelled" => "ملغاة",
        _ => "-",
    };

    let _ = write!(
        body,
        r#"<table>
<tr><th>نوع الإجازة</th><td>{}</td></tr>
<tr><th>من</th><td>{}</td></tr>
<tr><th>إلى</th><td>{}</td></tr>
<tr><th>عدد الأيام</th><td>{}</td></tr>
<tr><th>السبب</th><td>{}</td></tr>
<tr><th>القائم بالعمل</th><td>{}</td></tr>
<tr><th>الحالة</th><td>{}</td></tr>
</table>
<div class="signatures"><span>توقيع الموظف</span><span>القائم بالعمل</span><span>شؤون العاملين</span><span>المدير</span></div>
"#,
        leave_type,
        leave.start_date,
        leave.end_date,
        leave.days,
        escape(&leave.reason),
        escape(leave.substitute_name.as_deref().unwrap_or("-")),
        status,
    );

    page(title, &body)
}

/// Inline SVG QR code carrying the employee code, for badges scanned at the door.
pub fn badge_qr(employee_code: &str) -> Result<String, QrError> {
    let code = QrCode::new(employee_code.as_bytes())?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(180, 180)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build();

    // drop the XML prolog so the element can sit inside HTML
    Ok(match image.find("<svg") {
        Some(start) => image[start..].to_string(),
        None => image,
    })
}

/// Printable staff badge. `qr_svg` comes from [`badge_qr`] and is inserted as markup.
pub fn render_badge(head: &Letterhead<'_>, job_title: Option<&str>, qr_svg: &str) -> String {
    let title = "بطاقة الموظف";
    let mut body = String::new();

    let _ = write!(
        body,
        r#"<div class="badge">
<h2>{}</h2>
{}
<h1>{}</h1>
<p>{}</p>
<p>{}</p>
<p>{}</p>
</div>
"#,
        escape(head.center),
        qr_svg,
        escape(head.employee_name),
        escape(job_title.unwrap_or("-")),
        escape(head.department.unwrap_or("-")),
        escape(head.employee_code),
    );

    page(title, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};

    fn head<'a>(name: &'a str) -> Letterhead<'a> {
        Letterhead {
            center: "Al Salam <Clinic>",
            employee_name: name,
            employee_code: "EMP-012",
            department: None,
        }
    }

    fn record(notes: &str) -> Attendance {
        Attendance {
            id: 1,
            employee_id: 12,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            check_in: NaiveTime::from_hms_opt(8, 20, 0),
            check_out: NaiveTime::from_hms_opt(14, 0, 0),
            check_in_status: Some("late".into()),
            check_out_status: Some("complete".into()),
            late_minutes: 20,
            early_leave_minutes: 0,
            worked_minutes: 340,
            notes: Some(notes.into()),
        }
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape(r#"<a href="x">&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;&lt;/a&gt;"
        );
        assert_eq!(escape("منى عادل"), "منى عادل");
    }

    #[test]
    fn timesheet_escapes_names_and_notes() {
        let records = [record("<script>alert(1)</script>")];
        let summary = crate::domain::attendance_window::summarize(&records);
        let html = render_timesheet(&head("Mona & Co"), "2026-03", &records, &summary);

        assert!(html.contains("Mona &amp; Co"));
        assert!(html.contains("Al Salam &lt;Clinic&gt;"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn timesheet_is_printable_rtl() {
        let records = [record("")];
        let summary = crate::domain::attendance_window::summarize(&records);
        let html = render_timesheet(&head("Mona"), "2026-03", &records, &summary);

        assert!(html.contains(r#"dir="rtl""#));
        assert!(html.contains("window.print()"));
        assert!(html.contains("<td>08:20</td><td>متأخر</td>"));
        assert!(html.contains("<td>5:40</td>"));
    }

    /// Rasterise the QR modules and read them back with an independent decoder.
    fn decode_qr(data: &str) -> String {
        let code = QrCode::new(data.as_bytes()).unwrap();
        let colors = code.to_colors();
        let width = code.width();
        let (scale, quiet) = (4, 4);
        let side = (width + 2 * quiet) * scale;

        let mut img = rqrr::PreparedImage::prepare_from_greyscale(side, side, |x, y| {
            let (mx, my) = (x / scale, y / scale);
            if mx < quiet || my < quiet || mx >= width + quiet || my >= width + quiet {
                return 255;
            }
            match colors[(my - quiet) * width + (mx - quiet)] {
                qrcode::Color::Dark => 0,
                qrcode::Color::Light => 255,
            }
        });
        let grids = img.detect_grids();
        assert_eq!(grids.len(), 1);
        let (_, content) = grids[0].decode().unwrap();
        content
    }

    #[test]
    fn badge_qr_carries_the_employee_code() {
        assert_eq!(decode_qr("EMP-012"), "EMP-012");
        assert_eq!(decode_qr("A<&\"B"), "A<&\"B");
    }

    #[test]
    fn badge_qr_is_inline_svg() {
        let qr = badge_qr("EMP-012").unwrap();
        assert!(qr.starts_with("<svg"));
        assert!(!qr.contains("<?xml"));
        assert_eq!(qr, badge_qr("EMP-012").unwrap());
        assert_ne!(qr, badge_qr("EMP-013").unwrap());
    }

    #[test]
    fn badge_escapes_text_but_keeps_the_qr_markup() {
        let head = Letterhead {
            center: "Al Salam <Clinic>",
            employee_name: "Mona & Co",
            employee_code: "EMP-<12>",
            department: Some("ICU"),
        };
        let qr = badge_qr(head.employee_code).unwrap();
        let html = render_badge(&head, Some("Nurse \"A\""), &qr);

        assert!(html.contains(&qr));
        assert!(html.contains("Mona &amp; Co"));
        assert!(html.contains("Al Salam &lt;Clinic&gt;"));
        assert!(html.contains("<p>EMP-&lt;12&gt;</p>"));
        assert!(html.contains("Nurse &quot;A&quot;"));
        assert!(html.contains("window.print()"));
    }

    #[test]
    fn leave_form_shows_arabic_type_and_escaped_reason() {
        let leave = LeaveRequest {
            id: 31,
            employee_id: 12,
            leave_type: "annual".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 4, 5).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 4, 7).unwrap(),
            days: 3,
            reason: "Wedding \"abroad\"".into(),
            substitute_name: None,
            status: "pending".into(),
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        };
        let html = render_leave_form(&head("Mona"), &leave);

        assert!(html.contains("اعتيادية"));
        assert!(html.contains("Wedding &quot;abroad&quot;"));
        assert!(html.contains("قيد المراجعة"));
    }
}
