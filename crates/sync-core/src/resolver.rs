//! Cross-system entity resolver: maps Source project/area/person
//! identities to Sink page ids, creating pages on first encounter.

use db::{ProjectSyncRecord, Store, SyncOrigin};
use sink_client::{query_all, Filter, Page, PropertyBag, PropertyValue, SinkClient};
use source_client::Project;

use crate::Error;

pub struct Resolver<'a> {
    pub sink: &'a dyn SinkClient,
    pub store: &'a dyn Store,
    pub projects_collection_id: &'a str,
    pub areas_collection_id: Option<&'a str>,
    pub people_collection_id: Option<&'a str>,
    pub inbox_project_name: &'a str,
}

impl<'a> Resolver<'a> {
    /// Resolves a Source project to a Sink page id: record lookup, then a
    /// query by project-id property, then a create. The Inbox project is
    /// never resolved and always returns `None`.
    pub async fn resolve_project(&self, project: &Project) -> Result<Option<String>, Error> {
        if project.name == self.inbox_project_name {
            return Ok(None);
        }

        if let Some(record) = self.store.get_project_record(&project.id).await? {
            if let Some(page_id) = &record.sink_page_id {
                return Ok(Some(page_id.clone()));
            }
        }

        let filter = Filter::TextEquals { property: "Project-ID".into(), value: project.id.clone() };
        let found = query_all(self.sink, self.projects_collection_id, &[filter]).await?;
        if let Some(page) = found.into_iter().next() {
            self.save_project_page(&project.id, &page.id, SyncOrigin::Reconcile).await?;
            return Ok(Some(page.id));
        }

        let properties = PropertyBag::new()
            .with("Title", PropertyValue::Title { title: project.name.clone() })
            .with("Project-ID", PropertyValue::RichText { rich_text: project.id.clone() });
        let page = self.sink.create_page(self.projects_collection_id, properties, &[]).await?;
        self.save_project_page(&project.id, &page.id, SyncOrigin::Event).await?;
        Ok(Some(page.id))
    }

    async fn save_project_page(
        &self,
        source_project_id: &str,
        sink_page_id: &str,
        origin: SyncOrigin,
    ) -> Result<(), Error> {
        let mut record = self
            .store
            .get_project_record(source_project_id)
            .await?
            .unwrap_or_else(|| ProjectSyncRecord::new(source_project_id, origin));
        record.sink_page_id = Some(sink_page_id.to_string());
        self.store.save_project_record(&record).await?;
        Ok(())
    }

    /// Resolves an area name to a Sink page id in the optional Areas
    /// collection: exact case-insensitive title match, else create. No
    /// record tracking, unlike projects -- only Task and Project carry
    /// sync records.
    pub async fn resolve_area(&self, area_name: &str) -> Result<Option<String>, Error> {
        let Some(collection_id) = self.areas_collection_id else {
            return Ok(None);
        };
        if let Some(page) = find_by_title(self.sink, collection_id, |title| {
            title.eq_ignore_ascii_case(area_name)
        })
        .await?
        {
            return Ok(Some(page.id));
        }
        let properties =
            PropertyBag::new().with("Title", PropertyValue::Title { title: area_name.to_string() });
        let page = self.sink.create_page(collection_id, properties, &[]).await?;
        Ok(Some(page.id))
    }

    /// Resolves a person name to a Sink page id: exact case-insensitive
    /// match, then prefix/containment fuzzy match, else create.
    pub async fn resolve_person(&self, person_name: &str) -> Result<Option<String>, Error> {
        let Some(collection_id) = self.people_collection_id else {
            return Ok(None);
        };
        let lowered = person_name.to_lowercase();

        if let Some(page) =
            find_by_title(self.sink, collection_id, |title| title.eq_ignore_ascii_case(person_name))
                .await?
        {
            return Ok(Some(page.id));
        }
        if let Some(page) = find_by_title(self.sink, collection_id, |title| {
            let lowered_title = title.to_lowercase();
            lowered_title.starts_with(&lowered) || lowered_title.contains(&lowered)
        })
        .await?
        {
            return Ok(Some(page.id));
        }

        let properties =
            PropertyBag::new().with("Title", PropertyValue::Title { title: person_name.to_string() });
        let page = self.sink.create_page(collection_id, properties, &[]).await?;
        Ok(Some(page.id))
    }
}

async fn find_by_title(
    sink: &dyn SinkClient,
    collection_id: &str,
    predicate: impl Fn(&str) -> bool,
) -> Result<Option<Page>, Error> {
    let pages = query_all(sink, collection_id, &[]).await?;
    Ok(pages.into_iter().find(|page| {
        page.properties.get("Title").and_then(|v| v.as_title()).map(&predicate).unwrap_or(false)
    }))
}

#[cfg(test)]
mod tests {
    use db::test_utils::create_test_store;

    use crate::fakes::FakeSinkClient;

    use super::*;

    fn project(id: &str, name: &str) -> Project {
        Project { id: id.into(), name: name.into(), color: "grey".into(), shared: false, archived: false, parent_id: None }
    }

    #[tokio::test]
    async fn inbox_project_never_resolves() {
        let store = create_test_store().await;
        let sink = FakeSinkClient::default();
        let resolver = Resolver {
            sink: &sink,
            store: &store,
            projects_collection_id: "projects",
            areas_collection_id: None,
            people_collection_id: None,
            inbox_project_name: "Inbox",
        };

        let resolved = resolver.resolve_project(&project("P1", "Inbox")).await.unwrap();
        assert_eq!(resolved, None);
        assert!(sink.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unrecorded_project_creates_a_page_and_saves_the_record() {
        let store = create_test_store().await;
        let sink = FakeSinkClient::default();
        let resolver = Resolver {
            sink: &sink,
            store: &store,
            projects_collection_id: "projects",
            areas_collection_id: None,
            people_collection_id: None,
            inbox_project_name: "Inbox",
        };

        let resolved = resolver.resolve_project(&project("P1", "Launch")).await.unwrap();
        assert!(resolved.is_some());
        assert_eq!(sink.created.lock().unwrap().len(), 1);

        let record = store.get_project_record("P1").await.unwrap().unwrap();
        assert_eq!(record.sink_page_id, resolved);
    }

    #[tokio::test]
    async fn existing_record_short_circuits_without_querying_or_creating() {
        let store = create_test_store().await;
        let mut record = db::ProjectSyncRecord::new("P1", db::SyncOrigin::Reconcile);
        record.sink_page_id = Some("existing-page".into());
        store.save_project_record(&record).await.unwrap();
        let sink = FakeSinkClient::default();
        let resolver = Resolver {
            sink: &sink,
            store: &store,
            projects_collection_id: "projects",
            areas_collection_id: None,
            people_collection_id: None,
            inbox_project_name: "Inbox",
        };

        let resolved = resolver.resolve_project(&project("P1", "Launch")).await.unwrap();
        assert_eq!(resolved, Some("existing-page".to_string()));
        assert!(sink.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn resolve_area_returns_none_when_no_areas_collection_configured() {
        let store = create_test_store().await;
        let sink = FakeSinkClient::default();
        let resolver = Resolver {
            sink: &sink,
            store: &store,
            projects_collection_id: "projects",
            areas_collection_id: None,
            people_collection_id: None,
            inbox_project_name: "Inbox",
        };

        assert_eq!(resolver.resolve_area("HOME").await.unwrap(), None);
    }

    #[tokio::test]
    async fn resolve_area_matches_case_insensitively_and_does_not_recreate() {
        let store = create_test_store().await;
        let sink = FakeSinkClient::default();
        let resolver = Resolver {
            sink: &sink,
            store: &store,
            projects_collection_id: "projects",
            areas_collection_id: Some("areas"),
            people_collection_id: None,
            inbox_project_name: "Inbox",
        };

        let first = resolver.resolve_area("home").await.unwrap();
        assert!(first.is_some());
        assert_eq!(sink.created.lock().unwrap().len(), 1);

        let second = resolver.resolve_area("HOME").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(sink.created.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_person_falls_back_to_fuzzy_match() {
        let store = create_test_store().await;
        let sink = FakeSinkClient::default();
        let resolver = Resolver {
            sink: &sink,
            store: &store,
            projects_collection_id: "projects",
            areas_collection_id: None,
            people_collection_id: Some("people"),
            inbox_project_name: "Inbox",
        };

        let created = resolver.resolve_person("Alexandra Smith").await.unwrap();
        assert!(created.is_some());

        let fuzzy = resolver.resolve_person("Alex").await.unwrap();
        assert_eq!(fuzzy, created);
        assert_eq!(sink.created.lock().unwrap().len(), 1);
    }
}
