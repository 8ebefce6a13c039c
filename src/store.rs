use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future;
use tarpc::context;

use crate::{
    BulkGetRequest, BulkGetResponse, GetRequest, GetResponse, Metadata, SetRequest, SetResponse,
    StorageService, Value,
};

#[derive(Clone, Debug)]
struct Entry {
    value: Value,
    metadata: Metadata,
}

/// In-memory storage service. Clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct Store {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the value. An empty key is refused.
    pub fn put(&self, req: SetRequest) -> SetResponse {
        if req.key.is_empty() {
            return SetResponse { success: false };
        }
        let entry = Entry {
            value: req.value,
            metadata: req.metadata.unwrap_or_default(),
        };
        self.lock().insert(req.key, entry);
        SetResponse { success: true }
    }

    pub fn fetch(&self, req: &GetRequest) -> GetResponse {
        match self.lock().get(&req.key) {
            Some(entry) => GetResponse {
                value: Some(entry.value.clone().into()),
                metadata: entry.metadata.clone(),
            },
            None => GetResponse::default(),
        }
    }

    pub fn fetch_all(&self, req: &BulkGetRequest) -> BulkGetResponse {
        BulkGetResponse {
            responses: req.requests.iter().map(|r| self.fetch(r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageService for Store {
    type SetFut = future::Ready<SetResponse>;
    type GetFut = future::Ready<GetResponse>;
    type BulkGetFut = future::Ready<BulkGetResponse>;

    fn set(self, _: context::Context, req: SetRequest) -> Self::SetFut {
        future::ready(self.put(req))
    }

    fn get(self, _: context::Context, req: GetRequest) -> Self::GetFut {
        future::ready(self.fetch(&req))
    }

    fn bulk_get(self, _: context::Context, req: BulkGetRequest) -> Self::BulkGetFut {
        future::ready(self.fetch_all(&req))
    }
}
