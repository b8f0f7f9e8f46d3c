mod collection_pipeline;
mod twitter_client;
mod wikipedia_client;
mod yahoo_client;
