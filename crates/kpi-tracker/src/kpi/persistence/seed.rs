use crate::kpi::domain::{ComparisonOperator, Dataset, Kpi, KpiCategory, KpiId, Role, RoleId};

struct KpiTemplate {
    category: KpiCategory,
    name: &'static str,
    description: &'static str,
    metric: &'static str,
    unit: &'static str,
    target: &'static str,
    target_value: f64,
    operator: &'static str,
    weight: f64,
}

const fn quantitative(
    name: &'static str,
    description: &'static str,
    metric: &'static str,
    unit: &'static str,
    target: &'static str,
    target_value: f64,
    operator: &'static str,
    weight: f64,
) -> KpiTemplate {
    KpiTemplate {
        category: KpiCategory::Quantitative,
        name,
        description,
        metric,
        unit,
        target,
        target_value,
        operator,
        weight,
    }
}

const fn qualitative(
    name: &'static str,
    description: &'static str,
    metric: &'static str,
    target: &'static str,
    target_value: f64,
    weight: f64,
) -> KpiTemplate {
    KpiTemplate {
        category: KpiCategory::Qualitative,
        name,
        description,
        metric,
        unit: "score",
        target,
        target_value,
        operator: "≥",
        weight,
    }
}

const ROLES: &[(&str, &str, &[KpiTemplate])] = &[
    (
        "Support Agent",
        "Handles inbound customer tickets and escalations",
        &[
            quantitative(
                "Resolution Time",
                "Average time to resolve a ticket",
                "Average resolution time",
                "days",
                "≤ 3 days",
                3.0,
                "≤",
                40.0,
            ),
            quantitative(
                "First Contact Resolution",
                "Tickets closed without follow-up",
                "First contact resolution rate",
                "%",
                "≥ 75%",
                75.0,
                "≥",
                30.0,
            ),
            qualitative(
                "Customer Satisfaction",
                "Post-ticket survey rating",
                "Average survey score",
                "≥ 8",
                8.0,
                20.0,
            ),
            qualitative(
                "Knowledge Sharing",
                "Articles written and peer feedback",
                "Peer review score",
                "≥ 7",
                7.0,
                10.0,
            ),
        ],
    ),
    (
        "Software Engineer",
        "Builds and maintains product features",
        &[
            quantitative(
                "Delivery Rate",
                "Planned stories completed in the sprint",
                "Story completion rate",
                "%",
                "≥ 90%",
                90.0,
                "≥",
                40.0,
            ),
            quantitative(
                "Production Errors",
                "Incidents traced to shipped changes",
                "Error incidents per month",
                "count",
                "≤ 2 incidents",
                2.0,
                "≤",
                30.0,
            ),
            qualitative(
                "Code Review Quality",
                "Reviewer assessment of submitted changes",
                "Review quality score",
                "≥ 8",
                8.0,
                15.0,
            ),
            qualitative(
                "Collaboration",
                "Team feedback on collaboration",
                "Team feedback score",
                "≥ 8",
                8.0,
                15.0,
            ),
        ],
    ),
    (
        "Sales Representative",
        "Owns the pipeline for an assigned territory",
        &[
            quantitative(
                "Quota Attainment",
                "Booked revenue against monthly quota",
                "Quota attainment",
                "%",
                "≥ 100%",
                100.0,
                "≥",
                50.0,
            ),
            quantitative(
                "Qualified Meetings",
                "Discovery meetings with qualified leads",
                "Meetings held",
                "meetings",
                "= 20 meetings",
                20.0,
                "=",
                20.0,
            ),
            qualitative(
                "Client Relationship",
                "Account feedback from key clients",
                "Client feedback score",
                "≥ 8",
                8.0,
                30.0,
            ),
        ],
    ),
];

/// Built-in roles and KPIs used when no workbook exists yet.
///
/// Quantitative weights sum to 70 and qualitative weights to 30 for each role.
pub fn seed_dataset() -> Dataset {
    let mut dataset = Dataset::default();
    let mut next_kpi = 1;

    for (index, (name, description, templates)) in ROLES.iter().enumerate() {
        let role_id = RoleId(index as u32 + 1);
        dataset.roles.push(Role {
            id: role_id,
            name: (*name).to_string(),
            description: (*description).to_string(),
        });

        for template in templates.iter() {
            dataset.kpis.push(Kpi {
                id: KpiId(next_kpi),
                role_id,
                category: template.category,
                name: template.name.to_string(),
                description: template.description.to_string(),
                metric: template.metric.to_string(),
                unit: template.unit.to_string(),
                target: template.target.to_string(),
                target_value: template.target_value,
                operator: ComparisonOperator::parse(template.operator),
                weight: template.weight,
            });
            next_kpi += 1;
        }
    }

    dataset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_weights_split_seventy_thirty() {
        let dataset = seed_dataset();
        assert!(dataset.measurements.is_empty());
        for role in &dataset.roles {
            let weight = |category| -> f64 {
                dataset
                    .kpis
                    .iter()
                    .filter(|kpi| kpi.role_id == role.id && kpi.category == category)
                    .map(|kpi| kpi.weight)
                    .sum()
            };
            assert_eq!(weight(KpiCategory::Quantitative), 70.0, "{}", role.name);
            assert_eq!(weight(KpiCategory::Qualitative), 30.0, "{}", role.name);
        }
    }

    #[test]
    fn seed_starts_with_support_agent() {
        let dataset = seed_dataset();
        assert_eq!(dataset.roles[0].id, RoleId(1));
        assert_eq!(dataset.roles[0].name, "Support Agent");
        assert_eq!(dataset.kpis[0].operator, ComparisonOperator::LessOrEqual);
        assert_eq!(dataset.kpis[0].target_value, 3.0);
    }
}
