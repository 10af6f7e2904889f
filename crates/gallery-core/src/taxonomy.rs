//! The closed classification taxonomy.
//!
//! Every field the classifier emits is drawn from one of the vocabularies
//! below. Model output is validated against them term by term; anything
//! outside a vocabulary is dropped or replaced by the field's default.
//!
//! # Task hierarchy
//!
//! Tasks are tracked at two levels. [`SpecificTask`] is the fine-grained
//! term the model picks; [`TaskType`] is the broad grouping used for
//! filtering in the gallery. [`SpecificTask::broad_task`] maps the former
//! onto the latter, and [`derive_task_types`] applies that mapping to a
//! list while keeping order, dropping duplicates, and capping at
//! [`MAX_TASK_TYPES`].

/// Upper bound on the number of broad task types kept per item.
pub const MAX_TASK_TYPES: usize = 3;

vocabulary! {
    /// Top-level application area.
    pub enum ApplicationCategory {
        IndustrialAutomation => "industrial_automation",
        ServiceRobotics => "service_robotics",
        SurveillanceSecurity => "surveillance_security",
    }
}

vocabulary! {
    /// What kind of content an item is. Drives gallery curation.
    pub enum ContentType {
        /// Robot doing real work at a named customer site.
        RealApplication => "real_application",
        /// Trial or proof-of-concept at a real site.
        PilotPoc => "pilot_poc",
        /// Write-up with outcomes or metrics.
        CaseStudy => "case_study",
        /// Lab, trade-show, or staged demonstration.
        TechDemo => "tech_demo",
        /// Launch or marketing of a product.
        ProductAnnouncement => "product_announcement",
        /// How-to or educational walkthrough.
        Tutorial => "tutorial",
    }
}

vocabulary! {
    /// How far along the shown deployment is.
    pub enum DeploymentMaturity {
        Production => "production",
        Pilot => "pilot",
        Prototype => "prototype",
        Concept => "concept",
        Unknown => "unknown",
    }
}

vocabulary! {
    /// Broad task grouping.
    pub enum TaskType {
        Transportation => "transportation",
        Inspection => "inspection",
        Manipulation => "manipulation",
        Palletizing => "palletizing",
        Welding => "welding",
        Assembly => "assembly",
        QualityControl => "quality_control",
        Packaging => "packaging",
        DeliveryService => "delivery_service",
        HumanInteraction => "human_interaction",
        HealthcareAssist => "healthcare_assist",
        Cleaning => "cleaning",
        Reception => "reception",
        PerimeterPatrol => "perimeter_patrol",
        ThreatDetection => "threat_detection",
        AccessMonitoring => "access_monitoring",
    }
}

vocabulary! {
    /// Fine-grained task term.
    pub enum SpecificTask {
        // industrial
        PalletTransport => "pallet_transport",
        ToteTransport => "tote_transport",
        CartTowing => "cart_towing",
        DockToStock => "dock_to_stock",
        MachineTending => "machine_tending",
        AssemblyInsertion => "assembly_insertion",
        CasePalletizing => "case_palletizing",
        Depalletizing => "depalletizing",
        VisualInspection => "visual_inspection",
        WeldInspection => "weld_inspection",
        ScrewDriving => "screw_driving",
        MaterialHandling => "material_handling",
        BinPicking => "bin_picking",
        Kitting => "kitting",
        QualityControl => "quality_control",
        Packaging => "packaging",
        Welding => "welding",
        Painting => "painting",
        // service
        RoomDelivery => "room_delivery",
        MedicationDelivery => "medication_delivery",
        FoodDelivery => "food_delivery",
        FloorScrubbing => "floor_scrubbing",
        VacuumCleaning => "vacuum_cleaning",
        Disinfection => "disinfection",
        ReceptionGreeting => "reception_greeting",
        Wayfinding => "wayfinding",
        Telepresence => "telepresence",
        InventoryScanning => "inventory_scanning",
        Companion => "companion",
        Concierge => "concierge",
        // security
        PerimeterPatrol => "perimeter_patrol",
        IntrusionDetection => "intrusion_detection",
        AccessVerification => "access_verification",
        RemoteMonitoring => "remote_monitoring",
        ThreatDetection => "threat_detection",
        FacilityInspection => "facility_inspection",
    }
}

vocabulary! {
    /// Physical setting shown in the content.
    pub enum SceneType {
        Warehouse => "warehouse",
        Manufacturing => "manufacturing",
        Retail => "retail",
        Hospital => "hospital",
        Office => "office",
        Hotel => "hotel",
        Outdoor => "outdoor",
        Laboratory => "laboratory",
        Construction => "construction",
        LogisticsCenter => "logistics_center",
        Airport => "airport",
        Restaurant => "restaurant",
        Residential => "residential",
        Campus => "campus",
    }
}

vocabulary! {
    /// Capability the robot needs for the shown task.
    pub enum FunctionalRequirement {
        // navigation
        AutonomousNavigation => "autonomous_navigation",
        ObstacleAvoidance => "obstacle_avoidance",
        Slam => "slam",
        PathPlanning => "path_planning",
        FleetManagement => "fleet_management",
        MultiFloor => "multi_floor",
        OutdoorNavigation => "outdoor_navigation",
        // manipulation
        PickAndPlace => "pick_and_place",
        BinPicking3d => "bin_picking_3d",
        ForceControl => "force_control",
        VisionGuided => "vision_guided",
        GripperControl => "gripper_control",
        DualArm => "dual_arm",
        HighPrecision => "high_precision",
        // perception
        ObjectDetection => "object_detection",
        BarcodeScanning => "barcode_scanning",
        AiInference => "ai_inference",
        Vision3d => "3d_vision",
        DefectDetection => "defect_detection",
        Ocr => "ocr",
        ThermalImaging => "thermal_imaging",
        // safety
        HumanDetection => "human_detection",
        SafetyRated => "safety_rated",
        Collaborative => "collaborative",
        CollisionAvoidance => "collision_avoidance",
        EmergencyStop => "emergency_stop",
        ZoneMonitoring => "zone_monitoring",
        // integration
        WmsIntegration => "wms_integration",
        ErpIntegration => "erp_integration",
        MesIntegration => "mes_integration",
        ApiConnectivity => "api_connectivity",
    }
}

vocabulary! {
    /// Business problem the deployment addresses.
    pub enum ProblemSolved {
        LaborShortage => "labor_shortage",
        SafetyHazard => "safety_hazard",
        QualityConsistency => "quality_consistency",
        CostReduction => "cost_reduction",
        Throughput => "throughput",
        AroundTheClock => "24x7_operation",
        HazardousEnvironment => "hazardous_environment",
    }
}

vocabulary! {
    /// Size of the shown deployment.
    pub enum DeploymentScale {
        SingleUnit => "single_unit",
        SmallFleet => "small_fleet",
        LargeFleet => "large_fleet",
        FacilityWide => "facility_wide",
        MultiSite => "multi_site",
    }
}

vocabulary! {
    pub enum Setting {
        Indoor => "indoor",
        Outdoor => "outdoor",
        Mixed => "mixed",
    }
}

vocabulary! {
    pub enum HumanPresence {
        Unattended => "none",
        LowTraffic => "low_traffic",
        HighTraffic => "high_traffic",
        Collaborative => "collaborative",
    }
}

vocabulary! {
    pub enum FloorType {
        Smooth => "smooth",
        Uneven => "uneven",
        OutdoorTerrain => "outdoor_terrain",
        Mixed => "mixed",
    }
}

vocabulary! {
    pub enum Lighting {
        Natural => "natural",
        Artificial => "artificial",
        Mixed => "mixed",
        LowLight => "low_light",
    }
}

impl SpecificTask {
    /// The broad task type this specific task rolls up into.
    ///
    /// Terms without an explicit mapping fall through to the broad type of
    /// the same name when one exists (`welding`, `packaging`, ...).
    pub fn broad_task(&self) -> Option<TaskType> {
        use SpecificTask::*;
        let mapped = match self {
            PalletTransport | ToteTransport | CartTowing | DockToStock | MaterialHandling => {
                TaskType::Transportation
            }
            MachineTending | BinPicking | Kitting | Painting => TaskType::Manipulation,
            AssemblyInsertion | ScrewDriving => TaskType::Assembly,
            CasePalletizing | Depalletizing => TaskType::Palletizing,
            VisualInspection | WeldInspection | InventoryScanning | FacilityInspection => {
                TaskType::Inspection
            }
            RoomDelivery | MedicationDelivery | FoodDelivery => TaskType::DeliveryService,
            FloorScrubbing | VacuumCleaning | Disinfection => TaskType::Cleaning,
            ReceptionGreeting | Wayfinding | Telepresence | Companion | Concierge => {
                TaskType::HumanInteraction
            }
            PerimeterPatrol | RemoteMonitoring => TaskType::PerimeterPatrol,
            IntrusionDetection => TaskType::ThreatDetection,
            AccessVerification => TaskType::AccessMonitoring,
            other => return TaskType::parse(other.as_str()),
        };
        Some(mapped)
    }
}

/// Map specific tasks onto broad task types.
///
/// Order follows the first occurrence, duplicates are dropped, and the
/// result never exceeds [`MAX_TASK_TYPES`] entries.
pub fn derive_task_types(specific: &[SpecificTask]) -> Vec<TaskType> {
    let mut out: Vec<TaskType> = Vec::with_capacity(MAX_TASK_TYPES);
    for task in specific.iter().filter_map(SpecificTask::broad_task) {
        if out.len() == MAX_TASK_TYPES {
            break;
        }
        if !out.contains(&task) {
            out.push(task);
        }
    }
    out
}

/// Parse a list of raw terms against a vocabulary, keeping order and
/// dropping unknown terms and duplicates.
pub(crate) fn parse_terms<T, F>(terms: &[&str], parse: F) -> Vec<T>
where
    T: PartialEq,
    F: Fn(&str) -> Option<T>,
{
    let mut out = Vec::new();
    for term in terms {
        if let Some(v) = parse(term) {
            if !out.contains(&v) {
                out.push(v);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_sizes() {
        assert_eq!(ApplicationCategory::ALL.len(), 3);
        assert_eq!(ContentType::ALL.len(), 6);
        assert_eq!(DeploymentMaturity::ALL.len(), 5);
        assert_eq!(TaskType::ALL.len(), 16);
        assert_eq!(SpecificTask::ALL.len(), 36);
        assert_eq!(SceneType::ALL.len(), 14);
        assert_eq!(FunctionalRequirement::ALL.len(), 31);
    }

    #[test]
    fn wire_terms_round_trip_through_parse() {
        for t in SpecificTask::ALL {
            assert_eq!(SpecificTask::parse(t.as_str()), Some(*t));
        }
        assert_eq!(ProblemSolved::parse("24x7_operation"), Some(ProblemSolved::AroundTheClock));
        assert_eq!(FunctionalRequirement::parse("3d_vision"), Some(FunctionalRequirement::Vision3d));
        assert_eq!(ContentType::parse("Tech_Demo"), None);
    }

    #[test]
    fn serde_uses_wire_terms() {
        let json = serde_json::to_string(&HumanPresence::Unattended).unwrap();
        assert_eq!(json, "\"none\"");
        let back: ContentType = serde_json::from_str("\"pilot_poc\"").unwrap();
        assert_eq!(back, ContentType::PilotPoc);
    }

    #[test]
    fn every_specific_task_has_a_broad_type() {
        for t in SpecificTask::ALL {
            assert!(t.broad_task().is_some(), "{t} has no broad task type");
        }
    }

    #[test]
    fn pass_through_terms_map_to_same_name() {
        assert_eq!(SpecificTask::Welding.broad_task(), Some(TaskType::Welding));
        assert_eq!(SpecificTask::Packaging.broad_task(), Some(TaskType::Packaging));
        assert_eq!(
            SpecificTask::ThreatDetection.broad_task(),
            Some(TaskType::ThreatDetection)
        );
    }

    #[test]
    fn derive_dedups_and_caps() {
        let derived = derive_task_types(&[
            SpecificTask::PalletTransport,
            SpecificTask::ToteTransport,
            SpecificTask::BinPicking,
            SpecificTask::FloorScrubbing,
            SpecificTask::RoomDelivery,
        ]);
        assert_eq!(
            derived,
            vec![
                TaskType::Transportation,
                TaskType::Manipulation,
                TaskType::Cleaning
            ]
        );
    }

    #[test]
    fn derive_empty_is_empty() {
        assert!(derive_task_types(&[]).is_empty());
    }

    #[test]
    fn parse_terms_filters_unknown() {
        let got = parse_terms(&["slam", "teleportation", "slam", "ocr"], FunctionalRequirement::parse);
        assert_eq!(
            got,
            vec![FunctionalRequirement::Slam, FunctionalRequirement::Ocr]
        );
    }
}
