//! Plan presentation: an SVG Gantt board (one column per machine, hours
//! running downwards) and a flat CSV export of plan rows.

use svg::node::element::{
    path::Data, Group, LinearGradient, Path, Rectangle, Stop, Style, Text, Title, SVG,
};
use svg::Document;

use crate::model::{makespan, Equipment, PlanEntry};

const SCALE_MARGIN: usize = 50; // px
const LEFT_MARGIN: usize = SCALE_MARGIN + 20; // px
const TOP_HEADER_MARGIN: usize = 50; // px
const TOP_MARGIN: usize = TOP_HEADER_MARGIN + 20; // px
const RIGHT_MARGIN: usize = 30; // px
const BOTTOM_MARGIN: usize = 20; // px
const MACHINE_WIDTH: usize = 150; // px
const HOUR_SCALE: usize = 8; // px for each plan hour
const MACHINE_SPACING: usize = 10; // px

pub fn render_plan(plan: &[PlanEntry], equipment: &[Equipment]) -> String {
    // Create the linear gradient for the background
    let gradient = LinearGradient::new()
        .set("id", "background")
        .set("y1", "0")
        .set("y2", "1")
        .set("x1", "0")
        .set("x2", "0")
        .add(Stop::new().set("stop-color", "#eeeeee").set("offset", "5%"))
        .add(
            Stop::new()
                .set("stop-color", "#b0b0ee")
                .set("offset", "95%"),
        );

    let document = equipment
        .iter()
        .enumerate()
        .map(|(column, eq)| create_machine_header(column, &eq.name))
        .fold(
            Document::new()
                .set("version", "1.1")
                .set("xmlns", "http://www.w3.org/2000/svg")
                .set("xmlns:svg", "http://www.w3.org/2000/svg")
                .add(gradient)
                .add(Style::new(
                    r#"
    text { font-family:monospace; font-size:10px; fill:black; }
    #title { text-anchor:middle; font-size:25px; }
    .machine-header { text-anchor:middle; font-size:14px; }
    .assignment-box { stroke-width:1; stroke:black; }
    .assignment-label { text-anchor:middle; dominant-baseline:middle; font-size:12px; fill:white; }
    .scale-label { text-anchor:end; dominant-baseline:middle; font-size:10px; }
    "#,
                ))
                // background
                .add(
                    Rectangle::new()
                        .set("x", 0)
                        .set("y", 0)
                        .set("width", "100%")
                        .set("height", "100%")
                        .set("fill", "url(#background)"),
                )
                // title
                .add(
                    Text::new("Production plan")
                        .set("id", "title")
                        .set("x", "50%")
                        .set("y", 24),
                ),
            |doc, header| doc.add(header),
        );

    let height = TOP_MARGIN + makespan(plan) as usize * HOUR_SCALE;
    let document = add_assignments(document, plan, equipment);

    let body = document
        .add(create_time_scale(height))
        .set(
            "width",
            (LEFT_MARGIN + equipment.len() * (MACHINE_WIDTH + MACHINE_SPACING) + RIGHT_MARGIN)
                .saturating_sub(MACHINE_SPACING),
        )
        .set("height", height + BOTTOM_MARGIN)
        .to_string();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="no"?>
{body}"#
    )
}

fn add_assignments(document: SVG, plan: &[PlanEntry], equipment: &[Equipment]) -> SVG {
    let mut doc = document;
    for entry in plan {
        for process in &entry.processes {
            let Some(column) = equipment
                .iter()
                .position(|eq| eq.id == process.equipment_id)
            else {
                continue;
            };
            let x = LEFT_MARGIN + column * (MACHINE_WIDTH + MACHINE_SPACING);
            let y = TOP_MARGIN + process.start_time as usize * HOUR_SCALE;
            let w = MACHINE_WIDTH;
            let h = ((process.end_time - process.start_time) as usize) * HOUR_SCALE;

            let assignment_box = Rectangle::new()
                .set("x", x)
                .set("y", y)
                .set("width", w)
                .set("height", h)
                .set("fill", "#0000f8")
                .set("class", "assignment-box");
            let label = Text::new(entry.order_id.clone())
                .set("x", x + w / 2)
                .set("y", y + h / 2)
                .set("class", "assignment-label");
            let tooltip = Title::new(format!(
                "{} ({})\n\n{} from hour {} to hour {}",
                entry.order_id,
                entry.product_id,
                process.process_type,
                process.start_time,
                process.end_time
            ));

            doc = doc.add(Group::new().add(assignment_box).add(label).add(tooltip));
        }
    }
    doc
}

fn create_machine_header(column: usize, name: &str) -> Text {
    let x = LEFT_MARGIN + column * (MACHINE_WIDTH + MACHINE_SPACING) + (MACHINE_WIDTH / 2);
    let y = TOP_HEADER_MARGIN;
    Text::new(name.to_string())
        .set("x", x)
        .set("y", y)
        .set("width", "100%")
        .set("height", "100%")
        .set("class", "machine-header")
}

fn create_time_scale(height: usize) -> Group {
    (0..(height - TOP_MARGIN) / HOUR_SCALE)
        .map(|hour| {
            let scaled = hour * HOUR_SCALE;
            let is_big = hour % 6 == 0;
            let width = if is_big { 10 } else { 5 };
            let line = Group::new().add(create_line(
                SCALE_MARGIN - width,
                TOP_MARGIN + scaled,
                width,
                0,
            ));
            if is_big {
                line.add(
                    Text::new(format!("{hour}h"))
                        .set("x", SCALE_MARGIN - 15)
                        .set("y", TOP_MARGIN + scaled)
                        .set("class", "scale-label"),
                )
            } else {
                line
            }
        })
        .fold(
            Group::new().add(create_line(
                SCALE_MARGIN,
                TOP_MARGIN,
                0,
                height - TOP_MARGIN,
            )),
            |group, line| group.add(line),
        )
}

fn create_line(x: usize, y: usize, w: usize, h: usize) -> Path {
    Path::new()
        .set("fill", "none")
        .set("stroke", "black")
        .set("stroke-width", 2)
        .set("d", Data::new().move_to((x, y)).line_by((w, h)))
}

/// Writes one CSV row per assignment, flat for spreadsheet use.
pub fn write_plan_csv(plan: &[PlanEntry], path: &str) -> csv::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "order_id",
        "product_id",
        "process_type",
        "equipment_id",
        "start_time",
        "end_time",
    ])?;
    for entry in plan {
        for process in &entry.processes {
            wtr.write_record([
                entry.order_id.clone(),
                entry.product_id.clone(),
                process.process_type.clone(),
                process.equipment_id.clone(),
                process.start_time.to_string(),
                process.end_time.to_string(),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{timestamp, ProcessAssignment};

    fn sample() -> (Vec<PlanEntry>, Vec<Equipment>) {
        let equipment = vec![Equipment {
            id: "EQ001".to_string(),
            name: "CNC machining center A".to_string(),
            process_type: "machining".to_string(),
            production_rate: 10.0,
            qualified_rate: 0.98,
            unqualified_rate: 0.02,
        }];
        let plan = vec![PlanEntry {
            order_id: "ORD001".to_string(),
            product_id: "P001".to_string(),
            quantity: 100,
            delivery_date: timestamp("2025-06-07 08:00:00"),
            processes: vec![ProcessAssignment {
                process_type: "machining".to_string(),
                equipment_id: "EQ001".to_string(),
                start_time: 0,
                end_time: 10,
            }],
        }];
        (plan, equipment)
    }

    #[test]
    fn svg_contains_headers_and_assignments() {
        let (plan, equipment) = sample();
        let rendered = render_plan(&plan, &equipment);
        assert!(rendered.contains("CNC machining center A"));
        assert!(rendered.contains("ORD001"));
        assert!(rendered.contains("assignment-box"));
    }

    #[test]
    fn csv_has_one_row_per_assignment() {
        let (plan, _) = sample();
        let path = std::env::temp_dir().join("production-scheduling-plan-test.csv");
        write_plan_csv(&plan, path.to_str().unwrap()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("order_id,product_id,process_type,equipment_id,start_time,end_time")
        );
        assert_eq!(lines.next(), Some("ORD001,P001,machining,EQ001,0,10"));
        assert_eq!(lines.next(), None);
        std::fs::remove_file(&path).ok();
    }
}
