#[cfg(test)]
mod tests {
    use crate::catalog::{CatalogIndex, ComponentCategory};
    use crate::config::BuilderConfig;
    use crate::document::Position;
    use crate::error::{DocumentError, RenderError, SynthesisError};
    use crate::finalize::{ENTRY_POINT, MANIFEST};
    use crate::merge::{CatalogPick, GeneratedComponentDefinition};
    use crate::session::{IngestWarning, Session};
    use crate::unit::{RenderNode, TagKind};
    use crate::validate::{ERR_CAPABILITY, ERR_SYNTAX};
    use crate::PropertyBag;
    use serde_json::{json, Value};
    use std::sync::Arc;

    const CARD_TEMPLATE: &str = "export default function Card({ title }) {\n  return <div className=\"card\">{title}</div>;\n}\n";

    fn bag(v: Value) -> PropertyBag {
        v.as_object().cloned().unwrap_or_default()
    }

    /// Catalog with a single `Card` that needs `pkg-a`.
    fn card_catalog() -> Arc<CatalogIndex> {
        let table = json!({
            "version": "test",
            "components": [{
                "id": "card",
                "displayName": "Card",
                "category": "content",
                "typeId": "Card",
                "requiredPackages": ["pkg-a", "@/lib/utils"],
                "sourceImportPath": "components/content/Card",
                "template": CARD_TEMPLATE
            }]
        });
        Arc::new(CatalogIndex::from_json(&table.to_string()).unwrap())
    }

    fn generated(type_id: &str, source: &str) -> GeneratedComponentDefinition {
        GeneratedComponentDefinition::new(type_id, source)
    }

    fn manifest(project: &crate::finalize::SynthesizedProject) -> Value {
        serde_json::from_str(project.file(MANIFEST).unwrap()).unwrap()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // END TO END
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_catalog_pick_exports_escaped_markup() {
        let mut session = Session::new(card_catalog(), BuilderConfig::default());
        let report = session
            .ingest_payload(
                r#"```json
{"components": [{"type": "card", "props": {"title": "Hello \"World\""}}]}
```"#,
            )
            .unwrap();
        assert_eq!(report.placed.len(), 1);
        assert!(report.warnings.is_empty());

        let instances = session.list_instances();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].instance.type_id, "Card");
        assert_eq!(instances[0].instance.category, ComponentCategory::Content);
        assert_eq!(instances[0].instance.properties["title"], json!("Hello \"World\""));

        let project = session.synthesize_project().unwrap();
        let app = project.file(ENTRY_POINT).unwrap();
        assert!(app.contains(r#"<Card title={"Hello \"World\""} />"#), "{}", app);
        assert!(app.contains("import Card from './components/content/Card';"));
        assert_eq!(project.file("src/components/content/Card.jsx"), Some(CARD_TEMPLATE));

        let manifest = manifest(&project);
        assert_eq!(manifest["dependencies"]["pkg-a"], "latest");
        assert_eq!(manifest["dependencies"]["react"], "^18.3.1");
        assert!(manifest["dependencies"].get("@/lib/utils").is_none());
        assert_eq!(manifest["type"], "module");
        assert!(project.skipped.is_empty());
    }

    #[test]
    fn test_scaffold_is_part_of_every_export() {
        let session = Session::default();
        let project = session.synthesize_project().unwrap();
        for path in [
            "index.html",
            "vite.config.js",
            "src/main.jsx",
            "src/index.css",
            "src/components/ui/primitives.jsx",
            MANIFEST,
            ENTRY_POINT,
        ] {
            assert!(project.file(path).is_some(), "missing {}", path);
        }
    }

    #[test]
    fn test_export_writes_to_disk() {
        let mut session = Session::default();
        session.place_component("footer", None, None).unwrap();
        let project = session.synthesize_project().unwrap();

        let dir = tempfile::tempdir().unwrap();
        project.write_to(dir.path()).unwrap();
        let app = std::fs::read_to_string(dir.path().join(ENTRY_POINT)).unwrap();
        assert!(app.contains("<Footer"));
        assert!(dir.path().join("src/components/layout/Footer.jsx").is_file());
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // MERGE & INGESTION
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_generated_definition_wins_over_catalog_pick() {
        let mut session = Session::default();
        let report = session.ingest_batch(
            vec![CatalogPick::new("card", bag(json!({ "title": "From catalog" })))],
            vec![generated(
                "Card",
                "function Card({ title = \"Generated\" }) { return <Box><Text>{title}</Text></Box>; }",
            )],
        );
        assert_eq!(report.placed.len(), 1);
        assert_eq!(report.registered, vec!["Card".to_string()]);
        assert!(session.is_known_generated("Card"));
        assert!(session.get_source_text("Card").unwrap().contains("function Card"));

        let instances = session.list_instances();
        assert_eq!(instances.len(), 1);
        // generated defaults, not the catalog pick's props
        assert!(instances[0].instance.properties.is_empty());

        let nodes = session.render_instance(instances[0].id).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].tag(), Some("Box"));
        assert_eq!(nodes[0].text_content(), "Generated");

        let project = session.synthesize_project().unwrap();
        assert!(project.file("src/components/generated/Card.jsx").is_some());
        assert!(project.file("src/components/content/Card.jsx").is_none());
        assert!(project
            .file(ENTRY_POINT)
            .unwrap()
            .contains("import Card from './components/generated/Card';"));
    }

    #[test]
    fn test_generated_shadows_catalog_id_form() {
        let mut session = Session::default();
        assert!(session.compile_and_register(&generated(
            "Navbar",
            "const Navbar = () => <nav>custom</nav>;",
        )));
        // `navbar` is the catalog id of the builtin Navbar
        let report = session.ingest_batch(vec![CatalogPick::new("navbar", PropertyBag::new())], vec![]);
        assert_eq!(report.placed.len(), 1);
        let id = report.placed[0];
        let nodes = session.render_instance(id).unwrap();
        assert_eq!(nodes[0].tag(), Some("nav"));
        assert_eq!(nodes[0].text_content(), "custom");
    }

    #[test]
    fn test_duplicate_catalog_picks_last_wins() {
        let mut session = Session::default();
        let report = session.ingest_batch(
            vec![
                CatalogPick::new("Card", bag(json!({ "v": 1 }))),
                CatalogPick::new("Footer", PropertyBag::new()),
                CatalogPick::new("card", bag(json!({ "v": 2 }))),
            ],
            vec![],
        );
        assert_eq!(report.placed.len(), 2);

        let instances = session.list_instances();
        let types: Vec<&str> = instances.iter().map(|i| i.instance.type_id.as_str()).collect();
        assert_eq!(types, vec!["Footer", "Card"]);
        let card = &instances[1].instance;
        assert_eq!(card.properties["v"], json!(2));
        // defaults survive under the override
        assert_eq!(card.properties["title"], json!("Default"));
    }

    #[test]
    fn test_duplicate_generated_definitions_last_wins() {
        let mut session = Session::default();
        let first = "const Card = () => <Box><Text>first</Text></Box>;";
        let second = "const Card = () => <Box><Text>second</Text></Box>;";
        let report = session.ingest_batch(vec![], vec![generated("Card", first), generated("Card", second)]);

        assert_eq!(report.placed.len(), 1);
        assert_eq!(report.registered, vec!["Card".to_string()]);
        assert_eq!(session.list_instances().len(), 1);
        assert_eq!(session.get_source_text("Card"), Some(second));

        let nodes = session.render_instance(report.placed[0]).unwrap();
        assert_eq!(nodes[0].text_content(), "second");
    }

    #[test]
    fn test_null_override_removes_default() {
        let mut session = Session::default();
        session.ingest_batch(vec![CatalogPick::new("card", bag(json!({ "body": null })))], vec![]);
        let card = &session.list_instances()[0].instance;
        assert!(card.properties.contains_key("title"));
        assert!(!card.properties.contains_key("body"));
    }

    #[test]
    fn test_rejected_source_places_nothing() {
        let mut session = Session::default();
        let report = session.ingest_batch(
            vec![],
            vec![
                generated("Broken", "function Broken( { return <div /> }"),
                generated("Leaky", "function Leaky() { return <div>{document.title}</div>; }"),
                generated("Promo", "const Promo = () => <Text>Sale</Text>;"),
            ],
        );
        assert_eq!(report.placed.len(), 1);
        assert_eq!(report.registered, vec!["Promo".to_string()]);
        assert_eq!(report.warnings.len(), 2);

        match &report.warnings[0] {
            IngestWarning::RejectedSource { type_id, error } => {
                assert_eq!(type_id, "Broken");
                assert_eq!(error.code, ERR_SYNTAX);
            }
            other => panic!("unexpected warning {:?}", other),
        }
        match &report.warnings[1] {
            IngestWarning::RejectedSource { error, .. } => assert_eq!(error.code, ERR_CAPABILITY),
            other => panic!("unexpected warning {:?}", other),
        }

        assert!(!session.is_known_generated("Broken"));
        assert!(session.get_source_text("Broken").is_none());
        assert_eq!(session.document().len(), 1);
    }

    #[test]
    fn test_unknown_catalog_pick_is_reported() {
        let mut session = Session::default();
        let report = session.ingest_batch(
            vec![
                CatalogPick::new("carousel", PropertyBag::new()),
                CatalogPick::new("card", PropertyBag::new()),
            ],
            vec![],
        );
        assert_eq!(report.placed.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        assert!(matches!(
            &report.warnings[0],
            IngestWarning::UnknownType { type_id } if type_id == "Carousel"
        ));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["warnings"][0]["kind"], "unknownType");
        assert_eq!(json["warnings"][0]["typeId"], "Carousel");
    }

    #[test]
    fn test_bare_list_payload() {
        let mut session = Session::default();
        let report = session
            .ingest_payload(r#"[{"type": "hero-section"}, {"type": "footer"}]"#)
            .unwrap();
        assert_eq!(report.placed.len(), 2);
        assert!(session.ingest_payload("not json").is_err());
        assert!(session.ingest_payload("```\n```").is_err());
        assert_eq!(session.document().len(), 2);
    }

    #[test]
    fn test_positions_stack_vertically() {
        let mut session = Session::default();
        let report = session.ingest_batch(
            vec![
                CatalogPick::new("navbar", PropertyBag::new()),
                CatalogPick::new("footer", PropertyBag::new()),
            ],
            vec![],
        );
        let first = session.document().get(report.placed[0]).unwrap().position;
        let second = session.document().get(report.placed[1]).unwrap().position;
        assert_eq!(first, Position::new(40.0, 40.0));
        assert_eq!(second, Position::new(40.0, 200.0));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REGISTRAR
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_recompiling_identical_source_keeps_unit() {
        let mut session = Session::default();
        let def = generated("Promo", "const Promo = () => <Text>Sale</Text>;");
        assert!(session.compile_and_register(&def));
        let first = session.registry().get_unit("Promo").unwrap();
        assert!(session.compile_and_register(&def));
        let second = session.registry().get_unit("Promo").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // a failed recompile keeps serving the previous unit
        assert!(!session.compile_and_register(&generated("Promo", "const Promo = () => 1;")));
        let third = session.registry().get_unit("Promo").unwrap();
        assert!(Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = Session::default();
        let b = Session::default();
        assert!(a.compile_and_register(&generated("Promo", "const Promo = () => <b>x</b>;")));
        a.place_component("Promo", None, None).unwrap();

        assert!(a.is_known_generated("Promo"));
        assert!(!b.is_known_generated("Promo"));
        assert!(b.resolve("Promo").is_none());
        assert_eq!(a.document().len(), 1);
        assert!(b.document().is_empty());
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DOCUMENT
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_place_component_resolves_forms() {
        let mut session = Session::default();
        let id = session
            .place_component(
                "hero-section",
                Some(bag(json!({ "title": "Launch" }))),
                Some(Position::new(10.0, 20.0)),
            )
            .unwrap();
        let hero = session.document().get(id).unwrap();
        assert_eq!(hero.type_id, "HeroSection");
        assert_eq!(hero.category, ComponentCategory::Hero);
        assert_eq!(hero.properties["title"], json!("Launch"));
        assert_eq!(hero.properties["primaryAction"], json!("Start free"));
        assert_eq!(hero.position, Position::new(10.0, 20.0));

        let err = session.place_component("Carousel", None, None).unwrap_err();
        assert!(matches!(err, DocumentError::UnresolvedType(ref t) if t == "Carousel"));
    }

    #[test]
    fn test_edit_operations() {
        let mut session = Session::default();
        let id = session.place_component("card", None, None).unwrap();

        session
            .update_properties(id, bag(json!({ "title": "Edited", "body": null })))
            .unwrap();
        session.move_instance(id, Position::new(5.0, 6.0)).unwrap();
        let card = session.document().get(id).unwrap();
        assert_eq!(card.properties["title"], json!("Edited"));
        assert!(!card.properties.contains_key("body"));
        assert_eq!(card.position, Position::new(5.0, 6.0));

        let removed = session.remove_instance(id).unwrap();
        assert_eq!(removed.type_id, "Card");
        assert!(matches!(
            session.remove_instance(id),
            Err(DocumentError::UnknownInstance(_))
        ));
        assert!(matches!(
            session.render_instance(id),
            Err(RenderError::UnknownInstance(_))
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RENDER
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_render_generated_instance_with_props() {
        let mut session = Session::default();
        let source = r#"
            const Features = ({ items, heading = "Features" }) => (
                <Box>
                    <Heading>{heading}</Heading>
                    {items.map((item) => <Text key={item}>{item.toUpperCase()}</Text>)}
                </Box>
            );
        "#;
        assert!(session.compile_and_register(&generated("features", source)));
        let id = session
            .place_component("Features", Some(bag(json!({ "items": ["a", "b"] }))), None)
            .unwrap();

        let nodes = session.render_instance(id).unwrap();
        assert_eq!(nodes.len(), 1);
        let RenderNode::Element { tag, kind, children, .. } = &nodes[0] else {
            panic!("expected an element");
        };
        assert_eq!(tag, "Box");
        assert_eq!(*kind, TagKind::Atom);
        let tags: Vec<Option<&str>> = children.iter().map(RenderNode::tag).collect();
        assert_eq!(tags, vec![Some("Heading"), Some("Text"), Some("Text")]);
        assert_eq!(nodes[0].text_content(), "FeaturesAB");

        // the `key` prop is not forwarded
        let RenderNode::Element { props, .. } = &children[1] else {
            panic!("expected an element");
        };
        assert!(!props.contains_key("key"));
    }

    #[test]
    fn test_render_catalog_instance_as_placeholder() {
        let mut session = Session::default();
        let id = session
            .place_component("card", Some(bag(json!({ "title": "Hi" }))), None)
            .unwrap();
        let nodes = session.render_instance(id).unwrap();
        assert_eq!(nodes.len(), 1);
        let RenderNode::Element { tag, kind, props, children } = &nodes[0] else {
            panic!("expected an element");
        };
        assert_eq!(tag, "Card");
        assert_eq!(*kind, TagKind::Catalog);
        assert!(children.is_empty());
        assert_eq!(serde_json::to_value(&props["title"]).unwrap(), json!("Hi"));

        let json = serde_json::to_value(&nodes).unwrap();
        assert_eq!(json[0]["type"], "element");
        assert_eq!(json[0]["kind"], "catalog");
    }

    #[test]
    fn test_render_unresolved_instance_fails() {
        let mut session = Session::default();
        let id = session.add_instance("Ghost", ComponentCategory::Other, PropertyBag::new(), Position::new(0.0, 0.0));
        assert!(matches!(
            session.render_instance(id),
            Err(RenderError::NotCompiled(ref t)) if t == "Ghost"
        ));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXPORT
    // ═══════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_dependency_union_over_distinct_types() {
        let mut session = Session::default();
        session.ingest_batch(
            vec![
                CatalogPick::new("navbar", PropertyBag::new()),
                CatalogPick::new("pricing-table", PropertyBag::new()),
                CatalogPick::new("card", PropertyBag::new()),
            ],
            vec![generated("Promo", "const Promo = () => <Text>Sale</Text>;")],
        );

        let required = session.required_packages();
        assert_eq!(
            required.into_iter().collect::<Vec<_>>(),
            vec!["clsx".to_string(), "lucide-react".to_string()]
        );

        let project = session.synthesize_project().unwrap();
        assert_eq!(project.dependencies["lucide-react"], "^0.460.0");
        assert_eq!(project.dependencies["clsx"], "^2.1.1");
        assert_eq!(project.dependencies["react-dom"], "^18.3.1");
        assert!(!project.dependencies.contains_key("framer-motion"));
        assert!(project.dev_dependencies.contains_key("vite"));
    }

    #[test]
    fn test_generated_module_imports_its_capabilities() {
        let mut session = Session::default();
        let source = "function Counter({ start = 0 }) {\n  const [count] = useState(start);\n  return <Box><Text>{count}</Text></Box>;\n}";
        session.ingest_batch(vec![], vec![generated("Counter", source)]);

        let project = session.synthesize_project().unwrap();
        let module = project.file("src/components/generated/Counter.jsx").unwrap();
        assert!(module.starts_with(
            "import { Box, Text } from '../ui/primitives';\nimport { useState } from 'react';\n\n"
        ));
        assert!(module.contains("function Counter"));
        assert!(module.ends_with("export default Counter;\n"));

        let app = project.file(ENTRY_POINT).unwrap();
        assert!(app.contains("      <Counter />"));
    }

    #[test]
    fn test_each_type_is_emitted_once() {
        let mut session = Session::default();
        session.place_component("card", Some(bag(json!({ "title": "One" }))), None).unwrap();
        session.place_component("card", Some(bag(json!({ "title": "Two" }))), None).unwrap();

        let project = session.synthesize_project().unwrap();
        let app = project.file(ENTRY_POINT).unwrap();
        assert_eq!(app.matches("import Card from").count(), 1);
        let one = app.find("title=\"One\"").unwrap();
        let two = app.find("title=\"Two\"").unwrap();
        assert!(one < two);
    }

    #[test]
    fn test_unresolved_instance_is_skipped_on_export() {
        let mut session = Session::default();
        session.place_component("footer", None, None).unwrap();
        let ghost = session.add_instance("Ghost", ComponentCategory::Other, PropertyBag::new(), Position::new(0.0, 0.0));

        let project = session.synthesize_project().unwrap();
        assert_eq!(project.skipped.len(), 1);
        assert_eq!(project.skipped[0].id, ghost);
        assert_eq!(project.skipped[0].type_id, "Ghost");
        assert!(!project.file(ENTRY_POINT).unwrap().contains("Ghost"));
    }

    #[test]
    fn test_catalog_entry_without_template_is_skipped() {
        let catalog = CatalogIndex::from_json(
            r#"{"version": "t", "components": [
                {"id": "stub", "displayName": "Stub", "category": "media", "typeId": "Stub", "sourceImportPath": "components/Stub"}
            ]}"#,
        )
        .unwrap();
        let mut session = Session::new(Arc::new(catalog), BuilderConfig::default());
        session.place_component("stub", None, None).unwrap();

        let project = session.synthesize_project().unwrap();
        assert_eq!(project.skipped.len(), 1);
        assert!(project.file("src/components/Stub.jsx").is_none());
    }

    #[test]
    fn test_unserializable_property_aborts_export() {
        let mut session = Session::default();
        let id = session.place_component("card", None, None).unwrap();
        session
            .update_properties(id, bag(json!({ "bad key": 1 })))
            .unwrap();

        let err = session.synthesize_project().unwrap_err();
        match err {
            SynthesisError::Serialization { instance, type_id, source } => {
                assert_eq!(instance, id);
                assert_eq!(type_id, "Card");
                assert_eq!(source.key_path(), "bad key");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_nested_null_is_kept_and_fails_export() {
        let mut session = Session::default();
        let id = session.place_component("card", None, None).unwrap();
        session
            .update_properties(id, bag(json!({ "items": [1, null, 3] })))
            .unwrap();
        let card = &session.list_instances()[0].instance;
        assert_eq!(card.properties["items"], json!([1, null, 3]));

        match session.synthesize_project().unwrap_err() {
            SynthesisError::Serialization { instance, source, .. } => {
                assert_eq!(instance, id);
                assert_eq!(source.key_path(), "items[1]");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_generated_type_named_app_does_not_clash_with_entry_point() {
        let mut session = Session::default();
        session.ingest_batch(vec![], vec![generated("App", "const App = () => <Box><Text>hi</Text></Box>;")]);

        let project = session.synthesize_project().unwrap();
        let app = project.file(ENTRY_POINT).unwrap();
        assert!(app.contains("import App from './components/generated/App';"), "{}", app);
        assert!(app.contains("export default function AppRoot() {"), "{}", app);
        assert!(app.contains("      <App />"));
        assert!(!app.contains("function App("));
    }

    #[test]
    fn test_project_config_flows_into_manifest() {
        let mut config = BuilderConfig::default();
        config.project.name = "landing".to_string();
        config.packages.denylist.push("lucide-react".to_string());
        let mut session = Session::new(CatalogIndex::builtin(), config);
        session.place_component("navbar", None, None).unwrap();

        let project = session.synthesize_project().unwrap();
        let manifest = manifest(&project);
        assert_eq!(manifest["name"], "landing");
        assert!(manifest["dependencies"].get("lucide-react").is_none());
    }
}
