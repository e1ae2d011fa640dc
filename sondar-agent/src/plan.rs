use sondar_prompt::strip_code_fences;

/// What the planner chose for the next step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanDirective {
    Sql(String),
    Python(String),
    Done(String),
}

const MARKERS: [&str; 3] = ["SQL:", "PYTHON:", "DONE:"];

impl PlanDirective {
    /// Parses a plan response of the `SQL:` / `PYTHON:` / `DONE:` convention:
    /// the first marker line wins and the rest of the reply is its body. A
    /// bare SELECT is tolerated; anything else is unparseable and costs the
    /// caller a replan.
    pub fn parse(response: &str) -> Result<Self, String> {
        let text = strip_code_fences(response);

        let lines: Vec<&str> = text.lines().collect();
        for (index, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            let upper = trimmed.to_uppercase();
            let Some(marker) = MARKERS.iter().find(|m| upper.starts_with(**m)) else {
                continue;
            };

            let mut body = Vec::new();
            let inline = trimmed[marker.len()..].trim();
            if !inline.is_empty() {
                body.push(inline.to_string());
            }
            body.extend(lines[index + 1..].iter().map(|l| l.to_string()));
            let body = body.join("\n").trim().to_string();
            if body.is_empty() {
                return Err(format!("empty {marker} section"));
            }

            return Ok(match *marker {
                "SQL:" => PlanDirective::Sql(body),
                "PYTHON:" => PlanDirective::Python(body),
                _ => PlanDirective::Done(body),
            });
        }

        let upper = text.trim_start().to_uppercase();
        if upper.starts_with("SELECT") || upper.starts_with("WITH") {
            return Ok(PlanDirective::Sql(text.trim().to_string()));
        }

        Err("plan response matched no directive".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sql_sections() {
        let directive = PlanDirective::parse("SQL:\nSELECT * FROM \"sales\"").unwrap();
        assert_eq!(
            directive,
            PlanDirective::Sql("SELECT * FROM \"sales\"".to_string())
        );
    }

    #[test]
    fn parses_python_sections_with_multiple_lines() {
        let directive =
            PlanDirective::parse("PYTHON:\nq1 = sales['AMOUNT'].quantile(0.25)\nprint(q1)")
                .unwrap();
        match directive {
            PlanDirective::Python(code) => assert!(code.contains("quantile")),
            other => panic!("unexpected directive: {other:?}"),
        }
    }

    #[test]
    fn parses_done_with_synthesis() {
        let directive = PlanDirective::parse("DONE:\nThe average is 4000.").unwrap();
        assert_eq!(
            directive,
            PlanDirective::Done("The average is 4000.".to_string())
        );
    }

    #[test]
    fn the_first_marker_line_wins() {
        let directive =
            PlanDirective::parse("DONE:\nQuartiles came from the earlier SQL: exploration.")
                .unwrap();
        assert!(matches!(directive, PlanDirective::Done(_)));
    }

    #[test]
    fn tolerates_bare_select() {
        let directive = PlanDirective::parse("SELECT COUNT(*) FROM \"sales\"").unwrap();
        assert!(matches!(directive, PlanDirective::Sql(_)));
    }

    #[test]
    fn tolerates_fenced_replies() {
        let directive = PlanDirective::parse("```\nSQL:\nSELECT 1\n```").unwrap();
        assert_eq!(directive, PlanDirective::Sql("SELECT 1".to_string()));
    }

    #[test]
    fn rejects_unparseable_and_empty_sections() {
        assert!(PlanDirective::parse("let me think about it").is_err());
        assert!(PlanDirective::parse("SQL:").is_err());
        assert!(PlanDirective::parse("").is_err());
    }
}
