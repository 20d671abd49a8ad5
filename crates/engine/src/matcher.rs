use crate::config::StageCompatibility;
use crate::model::{ProductionJob, Resource};

/// Resources whose type fits the job's stage and whose skills cover every
/// required skill. Input order is preserved.
pub fn eligible_resources<'a>(
    job: &ProductionJob,
    resources: &'a [Resource],
    compatibility: &StageCompatibility,
) -> Vec<&'a Resource> {
    resources
        .iter()
        .filter(|r| compatibility.accepts(job.current_stage, r.resource_type))
        .filter(|r| job.required_skills.is_subset(&r.skills))
        .collect()
}

/// Whether any resource of a type compatible with the job's stage exists,
/// regardless of skills.
pub fn has_compatible_type(
    job: &ProductionJob,
    resources: &[Resource],
    compatibility: &StageCompatibility,
) -> bool {
    resources
        .iter()
        .any(|r| compatibility.accepts(job.current_stage, r.resource_type))
}

/// Required skills that no resource in the pool offers at all.
pub fn missing_skills(job: &ProductionJob, resources: &[Resource]) -> Vec<String> {
    job.required_skills
        .iter()
        .filter(|skill| !resources.iter().any(|r| r.skills.contains(*skill)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobStatus, Priority, ProductionStage, ResourceType};
    use chrono::NaiveDate;

    fn make_job(stage: ProductionStage, skills: &[&str]) -> ProductionJob {
        ProductionJob {
            id: "j".to_string(),
            order_id: "o".to_string(),
            client_name: "c".to_string(),
            garment_type: "shirt".to_string(),
            quantity: 10,
            priority: Priority::Medium,
            deadline: NaiveDate::from_ymd_opt(2026, 3, 9)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            estimated_hours: 1.0,
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            dependencies: Default::default(),
            current_stage: stage,
            status: JobStatus::Pending,
        }
    }

    fn make_resource(id: &str, kind: ResourceType, skills: &[&str]) -> Resource {
        Resource {
            id: id.to_string(),
            name: id.to_string(),
            resource_type: kind,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            capacity_hours_per_day: 8.0,
            availability: vec![],
            current_utilization: 0.0,
            efficiency_rating: 1.0,
        }
    }

    #[test]
    fn test_requires_skill_superset() {
        let resources = vec![
            make_resource("a", ResourceType::Machine, &["cut"]),
            make_resource("b", ResourceType::Machine, &["cut", "laser"]),
        ];
        let job = make_job(ProductionStage::Cutting, &["cut", "laser"]);
        let ids: Vec<&str> = eligible_resources(&job, &resources, &Default::default())
            .iter()
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_filters_incompatible_type() {
        let resources = vec![make_resource("press", ResourceType::Station, &["print"])];
        let job = make_job(ProductionStage::Sewing, &["print"]);
        assert!(eligible_resources(&job, &resources, &Default::default()).is_empty());
        assert!(!has_compatible_type(&job, &resources, &Default::default()));
    }

    #[test]
    fn test_missing_skills() {
        let resources = vec![make_resource("a", ResourceType::Machine, &["cut"])];
        let job = make_job(ProductionStage::Cutting, &["cut", "embroider"]);
        assert_eq!(missing_skills(&job, &resources), vec!["embroider".to_string()]);
    }
}
