//! In-memory remote used by tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use super::{
    CreatedObject, FileFetcher, Payload, Query, RemoteClient, RemoteError, RemoteObject,
    RemoteResult, UpdatedObject, UploadedFile,
};

/// A call made against the fake, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(String),
    Update(String, String),
    Delete(String, String),
    Upload(String),
    Query(String, usize),
}

/// Scriptable stand-in for Parse.
///
/// Objects are kept per class. Timestamps advance by one second per write so
/// ordering is deterministic.
#[derive(Default)]
pub struct FakeRemote {
    objects: RefCell<BTreeMap<(String, String), Payload>>,
    uploads: RefCell<HashMap<String, Vec<u8>>>,
    files: RefCell<HashMap<String, Vec<u8>>>,
    pages: RefCell<HashMap<String, Vec<RemoteObject>>>,
    calls: RefCell<Vec<Call>>,
    next_id: Cell<u32>,
    fail_all: Cell<bool>,
    fail_delete: Cell<bool>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn now(&self) -> DateTime<Utc> {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        base + Duration::seconds(i64::from(self.next_id.get()))
    }

    /// Pretend an object exists remotely.
    pub fn insert(&self, class_name: &str, object_id: &str, payload: Payload) {
        self.objects
            .borrow_mut()
            .insert((class_name.to_string(), object_id.to_string()), payload);
    }

    /// Delete an object out-of-band, leaving local copies stale.
    pub fn forget(&self, class_name: &str, object_id: &str) {
        self.objects
            .borrow_mut()
            .remove(&(class_name.to_string(), object_id.to_string()));
    }

    pub fn get(&self, class_name: &str, object_id: &str) -> Option<Payload> {
        self.objects
            .borrow()
            .get(&(class_name.to_string(), object_id.to_string()))
            .cloned()
    }

    pub fn object_count(&self, class_name: &str) -> usize {
        self.objects
            .borrow()
            .keys()
            .filter(|(class, _)| class == class_name)
            .count()
    }

    /// Serve `data` at `url` through [`FileFetcher`].
    pub fn serve_file(&self, url: &str, data: &[u8]) {
        self.files.borrow_mut().insert(url.to_string(), data.to_vec());
    }

    /// Results returned by `query` for a class, paged with `skip`/`limit`.
    pub fn set_query_results(&self, class_name: &str, results: Vec<RemoteObject>) {
        self.pages
            .borrow_mut()
            .insert(class_name.to_string(), results);
    }

    pub fn uploaded(&self, name: &str) -> Option<Vec<u8>> {
        self.uploads.borrow().get(name).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Every call fails with an API error (code 1, internal server error).
    pub fn fail_everything(&self) {
        self.fail_all.set(true);
    }

    /// Deletes fail with an API error.
    pub fn fail_deletes(&self) {
        self.fail_delete.set(true);
    }

    fn check(&self) -> RemoteResult<()> {
        if self.fail_all.get() {
            return Err(RemoteError::Api {
                code: 1,
                message: "internal server error".into(),
            });
        }
        Ok(())
    }

    fn log(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

impl RemoteClient for FakeRemote {
    fn create(&self, class_name: &str, payload: &Payload) -> RemoteResult<CreatedObject> {
        self.log(Call::Create(class_name.to_string()));
        self.check()?;
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        let object_id = format!("obj{n:04}");
        self.insert(class_name, &object_id, payload.clone());
        Ok(CreatedObject {
            object_id,
            created_at: self.now(),
        })
    }

    fn update(
        &self,
        class_name: &str,
        object_id: &str,
        payload: &Payload,
    ) -> RemoteResult<UpdatedObject> {
        self.log(Call::Update(class_name.to_string(), object_id.to_string()));
        self.check()?;
        let key = (class_name.to_string(), object_id.to_string());
        let mut objects = self.objects.borrow_mut();
        let Some(existing) = objects.get_mut(&key) else {
            return Err(RemoteError::ObjectNotFound {
                class_name: class_name.to_string(),
                object_id: object_id.to_string(),
            });
        };
        for (k, v) in payload {
            existing.insert(k.clone(), v.clone());
        }
        drop(objects);
        self.next_id.set(self.next_id.get() + 1);
        Ok(UpdatedObject {
            updated_at: self.now(),
        })
    }

    fn delete(&self, class_name: &str, object_id: &str) -> RemoteResult<()> {
        self.log(Call::Delete(class_name.to_string(), object_id.to_string()));
        self.check()?;
        if self.fail_delete.get() {
            return Err(RemoteError::Api {
                code: 119,
                message: "operation forbidden".into(),
            });
        }
        let removed = self
            .objects
            .borrow_mut()
            .remove(&(class_name.to_string(), object_id.to_string()));
        match removed {
            Some(_) => Ok(()),
            None => Err(RemoteError::ObjectNotFound {
                class_name: class_name.to_string(),
                object_id: object_id.to_string(),
            }),
        }
    }

    fn upload_file(&self, name: &str, data: &[u8]) -> RemoteResult<UploadedFile> {
        self.log(Call::Upload(name.to_string()));
        self.check()?;
        self.uploads
            .borrow_mut()
            .insert(name.to_string(), data.to_vec());
        Ok(UploadedFile {
            name: name.to_string(),
            url: Some(format!("https://files.example.com/{name}")),
        })
    }

    fn query(&self, class_name: &str, query: &Query) -> RemoteResult<Vec<RemoteObject>> {
        self.log(Call::Query(class_name.to_string(), query.skip));
        self.check()?;
        let pages = self.pages.borrow();
        let results = pages.get(class_name).map_or_else(Vec::new, |all| {
            all.iter()
                .skip(query.skip)
                .take(query.limit)
                .cloned()
                .collect()
        });
        Ok(results)
    }
}

impl FileFetcher for FakeRemote {
    fn fetch(&self, url: &str) -> RemoteResult<Vec<u8>> {
        self.files
            .borrow()
            .get(url)
            .cloned()
            .ok_or_else(|| RemoteError::Http(format!("404 Not Found fetching {url}")))
    }
}

/// Convert a `json!` object literal into a remote object.
pub fn object(value: Value) -> RemoteObject {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
